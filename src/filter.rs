//! Stimulus trial selection
//!
//! This module selects the rows of a trial table that belong to the stimulus
//! condition. Two strategies are supported:
//! - any-column: the marker appears in any cell of the row
//! - named-columns: the marker appears in one of the stimulus fields
//!   (`sound1`, `sound2`, `sound_1`, `sound_2` by default)
//!
//! Matching is a case-insensitive substring test. Selection never touches the
//! rows it leaves out and keeps the original row order.

use crate::config::FilterStrategy;
use crate::error::AnalysisError;
use crate::schema::{RawTrialRow, TrialTable};

/// Selects stimulus rows from a trial table
#[derive(Debug, Clone)]
pub struct TrialFilter {
    strategy: FilterStrategy,
    marker_lower: String,
    stimulus_fields: Vec<String>,
}

impl TrialFilter {
    pub fn new(strategy: FilterStrategy, marker: &str, stimulus_fields: &[String]) -> Self {
        Self {
            strategy,
            marker_lower: marker.to_lowercase(),
            stimulus_fields: stimulus_fields.to_vec(),
        }
    }

    pub fn strategy(&self) -> FilterStrategy {
        self.strategy
    }

    /// Return the stimulus rows of `table` in file order.
    ///
    /// With the named-column strategy this fails with
    /// [`AnalysisError::Schema`] when none of the stimulus fields exist in
    /// the table; individually missing fields simply never match.
    pub fn select<'a>(&self, table: &'a TrialTable) -> Result<Vec<&'a RawTrialRow>, AnalysisError> {
        match self.strategy {
            FilterStrategy::AnyColumn => Ok(table
                .rows
                .iter()
                .filter(|row| self.matches_any_column(row))
                .collect()),
            FilterStrategy::NamedColumns => {
                let present: Vec<&str> = self
                    .stimulus_fields
                    .iter()
                    .filter(|f| table.has_column(f))
                    .map(String::as_str)
                    .collect();

                if present.is_empty() {
                    return Err(AnalysisError::Schema(format!(
                        "none of the stimulus columns [{}] present",
                        self.stimulus_fields.join(", ")
                    )));
                }

                Ok(table
                    .rows
                    .iter()
                    .filter(|row| self.matches_named_columns(row, &present))
                    .collect())
            }
        }
    }

    fn matches_any_column(&self, row: &RawTrialRow) -> bool {
        row.values().any(|v| v.contains_marker(&self.marker_lower))
    }

    fn matches_named_columns(&self, row: &RawTrialRow, fields: &[&str]) -> bool {
        fields
            .iter()
            .any(|f| row.get(f).contains_marker(&self.marker_lower))
    }
}
