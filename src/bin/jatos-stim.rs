//! jatos-stim CLI - Command-line interface for the stimulus accuracy pipeline
//!
//! Commands:
//! - run: Walk results, merge with the survey and write all artifacts
//! - summarize: Walk results only and print participant summaries
//! - doctor: Diagnose configuration and input paths

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, info_span, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use jatos_stim::schema::SurveyTable;
use jatos_stim::{
    AnalysisError, FilterStrategy, ParticipantSummary, PipelineConfig, StimPipeline, VERSION,
};

/// jatos-stim - per-participant stimulus accuracy from JATOS result exports
#[derive(Parser)]
#[command(name = "jatos-stim")]
#[command(version = VERSION)]
#[command(
    about = "Summarize stimulus trials per participant and merge with a survey",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the merged, detailed and report files
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Skip the detailed per-trial table
        #[arg(long)]
        no_detailed: bool,
    },

    /// Print participant summaries without merging
    Summarize {
        #[command(flatten)]
        common: CommonArgs,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration and input paths
    Doctor {
        #[command(flatten)]
        common: CommonArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory of the JATOS results export
    #[arg(long)]
    results_root: Option<PathBuf>,

    /// Survey export (CSV)
    #[arg(long)]
    survey: Option<PathBuf>,

    /// Directory for output artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Case-insensitive stimulus marker
    #[arg(long)]
    marker: Option<String>,

    /// Trial selection strategy
    #[arg(long)]
    strategy: Option<StrategyArg>,
}

impl CommonArgs {
    /// Load the config file (or defaults) and apply flag overrides
    fn resolve(&self) -> Result<PipelineConfig, AnalysisError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(root) = &self.results_root {
            config.results_root = root.clone();
        }
        if let Some(survey) = &self.survey {
            config.survey_file = survey.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(marker) = &self.marker {
            config.stimulus_marker = marker.clone();
        }
        if let Some(strategy) = self.strategy {
            config.filter_strategy = strategy.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Match the marker in any cell of the row
    AnyColumn,
    /// Match the marker in the stimulus columns only
    NamedColumns,
}

impl From<StrategyArg> for FilterStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::AnyColumn => FilterStrategy::AnyColumn,
            StrategyArg::NamedColumns => FilterStrategy::NamedColumns,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one summary per line)
    Ndjson,
    /// JSON array of summaries
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StimCliError> {
    match cli.command {
        Commands::Run {
            common,
            no_detailed,
        } => {
            let mut config = common.resolve()?;
            if no_detailed {
                config.write_detailed = false;
            }
            cmd_run(config)
        }
        Commands::Summarize {
            common,
            output_format,
        } => cmd_summarize(common.resolve()?, &output_format),
        Commands::Doctor { common, json } => cmd_doctor(&common, json),
    }
}

fn cmd_run(config: PipelineConfig) -> Result<(), StimCliError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);
    let _guard = span.enter();

    info!(
        results_root = %config.results_root.display(),
        survey = %config.survey_file.display(),
        "starting pipeline"
    );

    let (analysis, artifacts) = StimPipeline::new(config)?.run(run_id)?;

    info!(
        participants = analysis.summaries.len(),
        merged_rows = analysis.merged.len(),
        skipped_files = analysis.skipped.len(),
        merged = %artifacts.merged.display(),
        "pipeline finished"
    );
    Ok(())
}

fn cmd_summarize(config: PipelineConfig, format: &OutputFormat) -> Result<(), StimCliError> {
    let outcome = StimPipeline::new(config)?.summarize()?;

    let output = format_output(&outcome.summaries, format)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(output.as_bytes())?;
    handle.flush()?;
    Ok(())
}

fn cmd_doctor(common: &CommonArgs, json: bool) -> Result<(), StimCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck::ok(
        "version",
        format!("jatos-stim version {}", VERSION),
    )];

    let config = match common.resolve() {
        Ok(config) => {
            checks.push(DoctorCheck::ok("config", config_source(common)));
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck::error("config", e.to_string()));
            None
        }
    };

    if let Some(config) = &config {
        checks.push(check_results_root(&config.results_root));
        checks.push(
            match SurveyTable::load(&config.survey_file, &config.survey_key_column) {
                Ok(survey) => DoctorCheck::ok(
                    "survey",
                    format!(
                        "{} records, {} columns",
                        survey.records.len(),
                        survey.columns.len()
                    ),
                ),
                Err(e) => DoctorCheck::error("survey", e.to_string()),
            },
        );
        checks.push(check_output_dir(&config.output_dir));
    }

    let report = DoctorReport {
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("jatos-stim Doctor Report");
        println!("========================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StimCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn config_source(common: &CommonArgs) -> String {
    match &common.config {
        Some(path) => format!("Loaded {}", path.display()),
        None => "Using defaults".to_string(),
    }
}

fn check_results_root(root: &Path) -> DoctorCheck {
    match fs::read_dir(root) {
        Ok(entries) => {
            let participants = entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .count();
            if participants == 0 {
                DoctorCheck::warning("results_root", "No participant directories".to_string())
            } else {
                DoctorCheck::ok(
                    "results_root",
                    format!("{} participant directories", participants),
                )
            }
        }
        Err(e) => DoctorCheck::error(
            "results_root",
            format!("Cannot read {}: {}", root.display(), e),
        ),
    }
}

fn check_output_dir(dir: &Path) -> DoctorCheck {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => DoctorCheck::error(
            "output_dir",
            format!("{} is not a directory", dir.display()),
        ),
        // Permission bits alone miss ownership and ACLs, so try an actual write
        Ok(_) => match tempfile::tempfile_in(dir) {
            Ok(_) => DoctorCheck::ok("output_dir", format!("{} is writable", dir.display())),
            Err(e) => DoctorCheck::error(
                "output_dir",
                format!("{} is not writable: {}", dir.display(), e),
            ),
        },
        Err(_) => DoctorCheck::warning(
            "output_dir",
            format!("{} does not exist and will be created", dir.display()),
        ),
    }
}

fn format_output(
    summaries: &[ParticipantSummary],
    format: &OutputFormat,
) -> Result<String, StimCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for summary in summaries {
                lines.push(serde_json::to_string(summary)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(summaries)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(summaries)?),
    }
}

// Error types

#[derive(Debug)]
enum StimCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for StimCliError {
    fn from(e: io::Error) -> Self {
        StimCliError::Io(e)
    }
}

impl From<AnalysisError> for StimCliError {
    fn from(e: AnalysisError) -> Self {
        StimCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for StimCliError {
    fn from(e: serde_json::Error) -> Self {
        StimCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<StimCliError> for CliError {
    fn from(e: StimCliError) -> Self {
        match e {
            StimCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            StimCliError::Json(e) => {
                CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax")
            }
            StimCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            StimCliError::Analysis(e) => match e {
                AnalysisError::NoQualifyingData => CliError::new(
                    "NO_QUALIFYING_DATA",
                    "No participants with stimulus trials found.".to_string(),
                    "Check --marker and that trial files contain stimulus rows",
                ),
                e @ AnalysisError::Load { .. } => CliError::new(
                    "SURVEY_LOAD_ERROR",
                    e.to_string(),
                    "Check --survey and that it has a jatosStudyResultId column",
                ),
                e @ AnalysisError::Config(_) => CliError::new(
                    "CONFIG_ERROR",
                    e.to_string(),
                    "Run 'jatos-stim doctor' to check the configuration",
                ),
                e @ AnalysisError::Schema(_) => CliError::new(
                    "SCHEMA_ERROR",
                    e.to_string(),
                    "Use --strategy any-column or add stimulus columns",
                ),
                e @ AnalysisError::Io(_) => {
                    CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
                }
                e => CliError::new("ANALYSIS_ERROR", e.to_string(), "Check the input files"),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self::with_status(name, CheckStatus::Ok, message)
    }

    fn warning(name: &str, message: String) -> Self {
        Self::with_status(name, CheckStatus::Warning, message)
    }

    fn error(name: &str, message: String) -> Self {
        Self::with_status(name, CheckStatus::Error, message)
    }

    fn with_status(name: &str, status: CheckStatus, message: String) -> Self {
        DoctorCheck {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
