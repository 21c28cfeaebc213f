//! Core types for the jatos-stim pipeline
//!
//! This module defines the records that flow between stages: scored stimulus
//! trials, per-participant summaries, and merged summary/survey rows.

use crate::schema::{RawTrialRow, SurveyRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A trial row judged to belong to the stimulus condition, with its
/// correctness and timing resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusTrial {
    /// Raw participant id (result folder name)
    pub participant_id: String,
    /// The original row, untouched
    pub row: RawTrialRow,
    /// Correctness indicator used for the participant's totals
    pub is_correct: bool,
    /// Numeric timing value, `None` when absent or non-numeric
    pub response_time: Option<f64>,
}

/// Accuracy and reaction-time rollup for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    /// Result folder name, as found on disk
    pub participant_id: String,
    /// Folder name with the `study_result_` prefix removed; the join key
    pub participant_id_clean: String,
    pub total_correct: u32,
    /// Number of stimulus trials
    pub total_responses: u32,
    /// `total_correct / total_responses`, `None` when there were no responses
    pub accuracy: Option<f64>,
    /// Mean of numeric timing values, `None` when there were none
    pub avg_rt: Option<f64>,
}

/// One row of the merged output: a summary plus its matching survey row, if any
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub summary: ParticipantSummary,
    pub survey: Option<SurveyRecord>,
}

impl MergedRecord {
    /// Raw survey cell at `index`, `None` for unmatched participants
    pub fn survey_value(&self, index: usize) -> Option<&str> {
        self.survey
            .as_ref()
            .and_then(|s| s.values.get(index))
            .map(String::as_str)
    }
}

/// Why a component result contributed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SkipReason {
    /// The trial file has no content at all
    EmptyFile,
    /// Header present but no data rows
    NoRows,
    /// The file could not be parsed as delimited text
    Unparsable(String),
    /// The file lacks the columns the filter strategy requires
    Schema(String),
    /// No row matched the stimulus marker
    NoStimulusTrials,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyFile => write!(f, "empty file"),
            SkipReason::NoRows => write!(f, "no data rows"),
            SkipReason::Unparsable(e) => write!(f, "unparsable: {}", e),
            SkipReason::Schema(e) => write!(f, "schema: {}", e),
            SkipReason::NoStimulusTrials => write!(f, "no stimulus trials"),
        }
    }
}

/// A trial file that was skipped during traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}
