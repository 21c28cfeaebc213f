//! Result tree traversal
//!
//! JATOS exports one directory per study result, each holding one directory
//! per component result, each of which may hold a trial log:
//!
//! ```text
//! results_root/
//!   study_result_482910/
//!     comp-result_1051/
//!       data.csv
//!     comp-result_1052/
//!       data.csv
//! ```
//!
//! Every trial log goes through the filter and scorer; stimulus trials from
//! all component results of a participant are pooled into one summary.
//! Problems with a single file are logged and recorded, never fatal.

use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::filter::TrialFilter;
use crate::schema::TrialTable;
use crate::summary::{ParticipantAccumulator, TrialScorer};
use crate::types::{ParticipantSummary, SkipReason, SkippedFile, StimulusTrial};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything collected from one traversal
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// One summary per participant with at least one stimulus trial, in
    /// directory-name order
    pub summaries: Vec<ParticipantSummary>,
    /// Retained stimulus trials (only when requested)
    pub trials: Vec<StimulusTrial>,
    /// Trial files that contributed nothing, with the reason
    pub skipped: Vec<SkippedFile>,
    /// Number of participant directories visited
    pub participants_scanned: usize,
}

/// Walks a results root and produces participant summaries
#[derive(Debug, Clone)]
pub struct ResultTreeWalker {
    filter: TrialFilter,
    scorer: TrialScorer,
    trial_file_name: String,
    participant_prefix: String,
    keep_trials: bool,
}

impl ResultTreeWalker {
    pub fn new(
        filter: TrialFilter,
        scorer: TrialScorer,
        trial_file_name: impl Into<String>,
    ) -> Self {
        Self {
            filter,
            scorer,
            trial_file_name: trial_file_name.into(),
            participant_prefix: String::new(),
            keep_trials: false,
        }
    }

    /// Build a walker from pipeline settings
    pub fn from_config(config: &PipelineConfig) -> Self {
        let filter = TrialFilter::new(
            config.filter_strategy,
            &config.stimulus_marker,
            &config.stimulus_fields,
        );
        let scorer = TrialScorer::new(config.correctness, &config.timing_field_priority);
        Self::new(filter, scorer, config.trial_file_name.clone())
            .with_participant_prefix(config.participant_prefix.clone())
            .keep_trials(config.write_detailed)
    }

    pub fn with_participant_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.participant_prefix = prefix.into();
        self
    }

    /// Retain every stimulus trial in [`WalkOutcome::trials`]
    pub fn keep_trials(mut self, keep: bool) -> Self {
        self.keep_trials = keep;
        self
    }

    /// Traverse `root`. Only an unreadable root is an error.
    pub fn walk(&self, root: &Path) -> Result<WalkOutcome, AnalysisError> {
        let mut outcome = WalkOutcome::default();

        for (name, path) in sorted_entries(root)? {
            if !path.is_dir() {
                continue;
            }
            outcome.participants_scanned += 1;
            self.walk_participant(&name, &path, &mut outcome);
        }

        Ok(outcome)
    }

    fn walk_participant(&self, participant_id: &str, dir: &Path, outcome: &mut WalkOutcome) {
        let components = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "cannot list participant directory");
                return;
            }
        };

        let mut acc = ParticipantAccumulator::new(participant_id);

        for (_, component) in components {
            let data_file = component.join(&self.trial_file_name);
            if !data_file.is_file() {
                continue;
            }

            match self.process_trial_file(&data_file, participant_id) {
                Ok(trials) => {
                    debug!(
                        path = %data_file.display(),
                        stimulus_trials = trials.len(),
                        "processed component result"
                    );
                    acc.extend(&trials);
                    if self.keep_trials {
                        outcome.trials.extend(trials);
                    }
                }
                Err(reason) => {
                    warn!(path = %data_file.display(), %reason, "skipping trial file");
                    outcome.skipped.push(SkippedFile {
                        path: data_file,
                        reason,
                    });
                }
            }
        }

        if acc.total_responses() > 0 {
            outcome.summaries.push(acc.finish(&self.participant_prefix));
        }
    }

    /// Read, filter and score one trial log.
    ///
    /// Returns the reason as an error when the file yields no stimulus trials.
    pub fn process_trial_file(
        &self,
        path: &Path,
        participant_id: &str,
    ) -> Result<Vec<StimulusTrial>, SkipReason> {
        let table = match TrialTable::from_path(path) {
            Ok(Some(table)) => table,
            Ok(None) => return Err(SkipReason::EmptyFile),
            Err(e) => return Err(SkipReason::Unparsable(e.to_string())),
        };

        if table.is_empty() {
            return Err(SkipReason::NoRows);
        }

        let selected = self.filter.select(&table).map_err(|e| match e {
            AnalysisError::Schema(msg) => SkipReason::Schema(msg),
            other => SkipReason::Unparsable(other.to_string()),
        })?;

        if selected.is_empty() {
            return Err(SkipReason::NoStimulusTrials);
        }

        Ok(self.scorer.score(&table, &selected, participant_id))
    }
}

/// Directory entries sorted by name, so traversal order is stable across runs
fn sorted_entries(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
