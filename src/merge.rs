//! Summary/survey join
//!
//! Left outer join of participant summaries against the survey on
//! `participant_id_clean == survey key` (exact, case-sensitive). Every summary
//! appears in the output in input order; unmatched summaries carry no survey
//! row. With [`DuplicateKeyPolicy::FanOut`] a summary whose key occurs on
//! several survey rows is repeated once per row, as a relational join would.

use crate::config::DuplicateKeyPolicy;
use crate::schema::SurveyTable;
use crate::types::{MergedRecord, ParticipantSummary};
use tracing::{debug, warn};

/// Join `summaries` against `survey`
pub fn merge(
    summaries: &[ParticipantSummary],
    survey: &SurveyTable,
    policy: DuplicateKeyPolicy,
) -> Vec<MergedRecord> {
    let lookup = survey.key_lookup();
    let mut merged = Vec::with_capacity(summaries.len());
    let mut unmatched = 0usize;

    for summary in summaries {
        let matches = lookup
            .get(summary.participant_id_clean.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();

        match (matches, policy) {
            ([], _) => {
                unmatched += 1;
                merged.push(MergedRecord {
                    summary: summary.clone(),
                    survey: None,
                });
            }
            ([first, rest @ ..], DuplicateKeyPolicy::First) => {
                if !rest.is_empty() {
                    warn!(
                        key = %summary.participant_id_clean,
                        rows = matches.len(),
                        "duplicate survey key, joining the first row"
                    );
                }
                merged.push(MergedRecord {
                    summary: summary.clone(),
                    survey: Some(survey.records[*first].clone()),
                });
            }
            (all, DuplicateKeyPolicy::FanOut) => {
                for idx in all {
                    merged.push(MergedRecord {
                        summary: summary.clone(),
                        survey: Some(survey.records[*idx].clone()),
                    });
                }
            }
        }
    }

    debug!(
        participants = summaries.len(),
        rows = merged.len(),
        unmatched,
        "merged summaries with survey"
    );
    merged
}
