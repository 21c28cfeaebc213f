//! Pipeline orchestration
//!
//! This module provides the public entry points of jatos-stim. It runs the
//! stages in order:
//! 1. SurveyTable - load and normalize the survey export (fatal on failure)
//! 2. ResultTreeWalker - filter, score and summarize every participant
//! 3. merge - left join of summaries against the survey
//! 4. report - descriptive and inferential statistics
//! 5. export - merged table, detailed trial table, report JSON

use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::export;
use crate::merge::merge;
use crate::report::{compute_statistics, AnalysisReport, ReportStatistics};
use crate::schema::SurveyTable;
use crate::types::{MergedRecord, ParticipantSummary, SkippedFile, StimulusTrial};
use crate::walker::{ResultTreeWalker, WalkOutcome};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// In-memory result of a full analysis, before anything is written
#[derive(Debug, Clone)]
pub struct Analysis {
    pub survey: SurveyTable,
    pub summaries: Vec<ParticipantSummary>,
    pub merged: Vec<MergedRecord>,
    pub trials: Vec<StimulusTrial>,
    pub skipped: Vec<SkippedFile>,
    pub statistics: ReportStatistics,
}

/// Files written by [`StimPipeline::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub merged: PathBuf,
    pub detailed: Option<PathBuf>,
    pub report: PathBuf,
}

/// Runs the aggregation pipeline for one configuration
#[derive(Debug, Clone)]
pub struct StimPipeline {
    config: PipelineConfig,
}

impl StimPipeline {
    /// Create a pipeline, rejecting invalid configuration up front
    pub fn new(config: PipelineConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Walk the results tree only, without the survey.
    ///
    /// Fails with [`AnalysisError::NoQualifyingData`] when no participant has
    /// a stimulus trial.
    pub fn summarize(&self) -> Result<WalkOutcome, AnalysisError> {
        let outcome = ResultTreeWalker::from_config(&self.config)
            .keep_trials(false)
            .walk(&self.config.results_root)?;
        if outcome.summaries.is_empty() {
            return Err(AnalysisError::NoQualifyingData);
        }
        info!(
            participants = outcome.summaries.len(),
            scanned = outcome.participants_scanned,
            "summarized participants"
        );
        Ok(outcome)
    }

    /// Load, walk, merge and compute statistics without writing anything
    pub fn analyze(&self) -> Result<Analysis, AnalysisError> {
        let survey =
            SurveyTable::load(&self.config.survey_file, &self.config.survey_key_column)?;

        let outcome =
            ResultTreeWalker::from_config(&self.config).walk(&self.config.results_root)?;
        if outcome.summaries.is_empty() {
            return Err(AnalysisError::NoQualifyingData);
        }
        info!(
            participants = outcome.summaries.len(),
            scanned = outcome.participants_scanned,
            skipped_files = outcome.skipped.len(),
            "results processed"
        );

        let merged = merge(
            &outcome.summaries,
            &survey,
            self.config.duplicate_survey_keys,
        );
        let statistics = compute_statistics(&merged, &survey, &self.config.report);

        Ok(Analysis {
            survey,
            summaries: outcome.summaries,
            merged,
            trials: outcome.trials,
            skipped: outcome.skipped,
            statistics,
        })
    }

    /// Run the full pipeline and write every artifact
    pub fn run(&self, run_id: Uuid) -> Result<(Analysis, Artifacts), AnalysisError> {
        let analysis = self.analyze()?;
        let artifacts = self.write_artifacts(&analysis, run_id)?;
        Ok((analysis, artifacts))
    }

    fn write_artifacts(
        &self,
        analysis: &Analysis,
        run_id: Uuid,
    ) -> Result<Artifacts, AnalysisError> {
        fs::create_dir_all(&self.config.output_dir)?;

        let merged_path = self.config.merged_path();
        export::write_merged(&merged_path, &analysis.merged, &analysis.survey)?;
        info!(
            path = %merged_path.display(),
            rows = analysis.merged.len(),
            "wrote merged table"
        );

        let detailed = if self.config.write_detailed {
            let path = self.config.detailed_path();
            export::write_detailed(&path, &analysis.trials, &self.config.stimulus_fields)?;
            info!(
                path = %path.display(),
                rows = analysis.trials.len(),
                "wrote detailed trials"
            );
            Some(path)
        } else {
            None
        };

        let report_path = self.config.report_path();
        let report = AnalysisReport::new(
            run_id,
            analysis.skipped.len(),
            analysis.statistics.clone(),
        );
        fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        info!(path = %report_path.display(), "wrote report");

        Ok(Artifacts {
            merged: merged_path,
            detailed,
            report: report_path,
        })
    }
}

/// Run the pipeline for `config` with a fresh run id
pub fn run_pipeline(config: PipelineConfig) -> Result<(Analysis, Artifacts), AnalysisError> {
    StimPipeline::new(config)?.run(Uuid::new_v4())
}
