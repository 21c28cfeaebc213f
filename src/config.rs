//! Pipeline configuration
//!
//! Every option has a default, so an empty TOML file (or none at all) is a
//! valid configuration. The CLI layers its flags on top of whatever the file
//! provides.

use crate::error::AnalysisError;
use crate::schema::DEFAULT_SURVEY_KEY_COLUMN;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How stimulus rows are recognised in a trial table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterStrategy {
    /// Marker may appear in any cell of the row
    #[default]
    AnyColumn,
    /// Marker must appear in one of the configured stimulus fields
    NamedColumns,
}

/// Where a trial's correctness comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectnessSource {
    /// Use the `correct` column when the file has one, else compare responses
    #[default]
    Auto,
    /// Always sum the `correct` column
    CorrectField,
    /// Always compare `response` with `correct_response`
    ResponseMatch,
}

/// What to do when several survey rows share one join key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateKeyPolicy {
    /// Join against the first survey row with the key; one output row per participant
    #[default]
    First,
    /// Standard relational join: one output row per matching survey row
    FanOut,
}

/// Maps one survey answer to a group label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLabel {
    pub answer: String,
    pub label: String,
}

/// Options for the reporting statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Survey column holding the grouping answer
    pub group_column: String,
    /// Exactly two labels are compared by the t-test; the first two listed
    pub group_labels: Vec<GroupLabel>,
    /// Survey column holding the participant's age
    pub age_column: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            group_column: "Are you a native speaker of Mandarin Chinese?".to_string(),
            group_labels: vec![
                GroupLabel {
                    answer: "Yes".to_string(),
                    label: "Tonal".to_string(),
                },
                GroupLabel {
                    answer: "No".to_string(),
                    label: "Non-Tonal".to_string(),
                },
            ],
            age_column: "How old are you?".to_string(),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one subdirectory per study result
    pub results_root: PathBuf,
    /// Survey export to join against
    pub survey_file: PathBuf,
    /// Where artifacts are written
    pub output_dir: PathBuf,
    /// Trial log name inside each component result directory
    pub trial_file_name: String,
    /// Token identifying stimulus rows (case-insensitive)
    pub stimulus_marker: String,
    /// Timing columns, first present one wins
    pub timing_field_priority: Vec<String>,
    pub filter_strategy: FilterStrategy,
    /// Stimulus-identifying columns for the named-column strategy and the detailed export
    pub stimulus_fields: Vec<String>,
    pub correctness: CorrectnessSource,
    /// Prefix stripped from folder names to form the join key
    pub participant_prefix: String,
    pub survey_key_column: String,
    pub duplicate_survey_keys: DuplicateKeyPolicy,
    /// Also write every stimulus trial to the detailed table
    pub write_detailed: bool,
    pub merged_file_name: String,
    pub detailed_file_name: String,
    pub report_file_name: String,
    pub report: ReportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from("jatos_results"),
            survey_file: PathBuf::from("survey.csv"),
            output_dir: PathBuf::from("."),
            trial_file_name: "data.csv".to_string(),
            stimulus_marker: "stim".to_string(),
            timing_field_priority: vec![
                "average_response_time".to_string(),
                "response_time".to_string(),
            ],
            filter_strategy: FilterStrategy::default(),
            stimulus_fields: ["sound1", "sound2", "sound_1", "sound_2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            correctness: CorrectnessSource::default(),
            participant_prefix: "study_result_".to_string(),
            survey_key_column: DEFAULT_SURVEY_KEY_COLUMN.to_string(),
            duplicate_survey_keys: DuplicateKeyPolicy::default(),
            write_detailed: true,
            merged_file_name: "merged_results_stimuli_only.csv".to_string(),
            detailed_file_name: "stimuli_results_detailed.csv".to_string(),
            report_file_name: "report_summary.json".to_string(),
            report: ReportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, AnalysisError> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.stimulus_marker.is_empty() {
            return Err(AnalysisError::Config(
                "stimulus_marker must not be empty".to_string(),
            ));
        }
        if self.trial_file_name.is_empty() {
            return Err(AnalysisError::Config(
                "trial_file_name must not be empty".to_string(),
            ));
        }
        if self.filter_strategy == FilterStrategy::NamedColumns && self.stimulus_fields.is_empty()
        {
            return Err(AnalysisError::Config(
                "named-columns strategy needs at least one stimulus field".to_string(),
            ));
        }
        Ok(())
    }

    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(&self.merged_file_name)
    }

    pub fn detailed_path(&self) -> PathBuf {
        self.output_dir.join(&self.detailed_file_name)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file_name)
    }
}
