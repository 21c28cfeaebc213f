//! Reporting statistics
//!
//! Computes the descriptive and inferential statistics over the merged table:
//! group counts from a survey answer, a t-test of accuracy between the two
//! groups, and the correlation between age and accuracy. Statistics that
//! cannot be computed carry a short explanation instead of a value.

use crate::config::ReportConfig;
use crate::schema::SurveyTable;
use crate::stats::{self, Correlation, Descriptive, TTest};
use crate::types::MergedRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A statistic, or the reason it was not computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Computed(T),
    Skipped(String),
}

impl<T> Outcome<T> {
    pub fn skipped(reason: &str) -> Self {
        Outcome::Skipped(reason.to_string())
    }

    pub fn computed(&self) -> Option<&T> {
        match self {
            Outcome::Computed(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }
}

/// Statistics derived from the merged table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStatistics {
    pub participants: usize,
    /// Merged rows that found a survey match
    pub matched_survey_rows: usize,
    pub accuracy: Option<Descriptive>,
    pub avg_rt: Option<Descriptive>,
    pub group_counts: Outcome<BTreeMap<String, usize>>,
    pub t_test: Outcome<TTest>,
    pub correlation_age_accuracy: Outcome<Correlation>,
}

/// Report artifact written at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub version: String,
    pub skipped_files: usize,
    #[serde(flatten)]
    pub statistics: ReportStatistics,
}

impl AnalysisReport {
    pub fn new(run_id: Uuid, skipped_files: usize, statistics: ReportStatistics) -> Self {
        Self {
            run_id,
            generated_at: Utc::now(),
            version: crate::VERSION.to_string(),
            skipped_files,
            statistics,
        }
    }
}

/// Compute every report statistic over the merged records
pub fn compute_statistics(
    records: &[MergedRecord],
    survey: &SurveyTable,
    config: &ReportConfig,
) -> ReportStatistics {
    let accuracies: Vec<f64> = records.iter().filter_map(|r| r.summary.accuracy).collect();
    let rts: Vec<f64> = records.iter().filter_map(|r| r.summary.avg_rt).collect();

    let (group_counts, t_test) = group_comparison(records, survey, config);

    ReportStatistics {
        participants: records.len(),
        matched_survey_rows: records.iter().filter(|r| r.survey.is_some()).count(),
        accuracy: stats::describe(&accuracies),
        avg_rt: stats::describe(&rts),
        group_counts,
        t_test,
        correlation_age_accuracy: age_correlation(records, survey, config),
    }
}

/// Map a survey answer to its configured group label
fn group_label<'a>(config: &'a ReportConfig, answer: &str) -> Option<&'a str> {
    let answer = answer.trim();
    config
        .group_labels
        .iter()
        .find(|g| g.answer == answer)
        .map(|g| g.label.as_str())
}

fn group_comparison(
    records: &[MergedRecord],
    survey: &SurveyTable,
    config: &ReportConfig,
) -> (Outcome<BTreeMap<String, usize>>, Outcome<TTest>) {
    let Some(column) = survey.column_index(&config.group_column) else {
        return (
            Outcome::skipped("Group column not found."),
            Outcome::skipped("No group data found."),
        );
    };

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut accuracy_by_label: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for record in records {
        let Some(label) = record
            .survey_value(column)
            .and_then(|answer| group_label(config, answer))
        else {
            continue;
        };
        *counts.entry(label.to_string()).or_insert(0) += 1;
        if let Some(acc) = record.summary.accuracy {
            accuracy_by_label.entry(label).or_default().push(acc);
        }
    }

    if counts.is_empty() {
        return (
            Outcome::Computed(counts),
            Outcome::skipped("No group data found."),
        );
    }

    let mut labels: Vec<&str> = Vec::new();
    for g in &config.group_labels {
        if !labels.contains(&g.label.as_str()) {
            labels.push(g.label.as_str());
        }
    }
    let t_test = match labels.as_slice() {
        [first, second, ..] => {
            let a = accuracy_by_label
                .get(first)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let b = accuracy_by_label
                .get(second)
                .map(Vec::as_slice)
                .unwrap_or_default();
            match stats::ttest_ind(a, b) {
                Some(result) => Outcome::Computed(result),
                None => Outcome::skipped("Not enough data for T-test."),
            }
        }
        _ => Outcome::skipped("Need two group labels for T-test."),
    };

    (Outcome::Computed(counts), t_test)
}

fn age_correlation(
    records: &[MergedRecord],
    survey: &SurveyTable,
    config: &ReportConfig,
) -> Outcome<Correlation> {
    let Some(column) = survey.column_index(&config.age_column) else {
        return Outcome::skipped("Age column not found.");
    };

    let (ages, accuracies): (Vec<f64>, Vec<f64>) = records
        .iter()
        .filter_map(|r| {
            let age = r.survey_value(column)?.trim().parse::<f64>().ok()?;
            let accuracy = r.summary.accuracy?;
            (!age.is_nan()).then_some((age, accuracy))
        })
        .unzip();

    match stats::pearson(&ages, &accuracies) {
        Some(result) => Outcome::Computed(result),
        None => Outcome::skipped("Not enough data for correlation."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicateKeyPolicy;
    use crate::merge::merge;
    use crate::schema::DEFAULT_SURVEY_KEY_COLUMN;
    use crate::types::ParticipantSummary;
    use pretty_assertions::assert_eq;

    const SURVEY: &str = "jatosStudyResultId,Are you a native speaker of Mandarin Chinese?,How old are you?\n\
                          1,Yes,21\n\
                          2,Yes,34\n\
                          3,No,28\n\
                          4,No,n/a\n\
                          5,Maybe,40\n";

    fn summary(clean: &str, accuracy: f64) -> ParticipantSummary {
        ParticipantSummary {
            participant_id: format!("study_result_{}", clean),
            participant_id_clean: clean.to_string(),
            total_correct: 0,
            total_responses: 10,
            accuracy: Some(accuracy),
            avg_rt: Some(500.0),
        }
    }

    fn merged(csv: &str, summaries: &[ParticipantSummary]) -> (Vec<MergedRecord>, SurveyTable) {
        let survey = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN).unwrap();
        (merge(summaries, &survey, DuplicateKeyPolicy::First), survey)
    }

    #[test]
    fn test_group_counts_and_ttest() {
        let summaries = vec![
            summary("1", 0.9),
            summary("2", 0.8),
            summary("3", 0.6),
            summary("4", 0.5),
            summary("5", 0.7),
            summary("6", 0.4),
        ];
        let (records, survey) = merged(SURVEY, &summaries);
        let report = compute_statistics(&records, &survey, &ReportConfig::default());

        let mut expected = BTreeMap::new();
        expected.insert("Non-Tonal".to_string(), 2);
        expected.insert("Tonal".to_string(), 2);
        assert_eq!(report.group_counts, Outcome::Computed(expected));
        assert_eq!(report.participants, 6);
        assert_eq!(report.matched_survey_rows, 5);

        let t = report.t_test.computed().unwrap();
        assert_eq!(t.degrees_of_freedom, 2.0);
        assert!(t.t_statistic > 0.0);
    }

    #[test]
    fn test_ttest_needs_two_per_group() {
        let summaries = vec![summary("1", 0.9), summary("2", 0.8), summary("3", 0.6)];
        let (records, survey) = merged(SURVEY, &summaries);
        let report = compute_statistics(&records, &survey, &ReportConfig::default());

        assert_eq!(
            report.t_test,
            Outcome::Skipped("Not enough data for T-test.".to_string())
        );
    }

    #[test]
    fn test_age_correlation_skips_non_numeric_ages() {
        let summaries = vec![
            summary("1", 0.9),
            summary("2", 0.8),
            summary("3", 0.6),
            summary("4", 0.5),
        ];
        let (records, survey) = merged(SURVEY, &summaries);
        let report = compute_statistics(&records, &survey, &ReportConfig::default());

        let corr = report.correlation_age_accuracy.computed().unwrap();
        assert_eq!(corr.n, 3);
    }

    #[test]
    fn test_missing_columns() {
        let summaries = vec![summary("1", 0.9)];
        let (records, survey) = merged("jatosStudyResultId\n1\n", &summaries);
        let report = compute_statistics(&records, &survey, &ReportConfig::default());

        assert_eq!(
            report.group_counts,
            Outcome::skipped("Group column not found.")
        );
        assert_eq!(report.t_test, Outcome::skipped("No group data found."));
        assert_eq!(
            report.correlation_age_accuracy,
            Outcome::skipped("Age column not found.")
        );
    }

    #[test]
    fn test_descriptives_skip_undefined() {
        let mut no_rt = summary("2", 0.5);
        no_rt.avg_rt = None;
        let (records, survey) = merged(SURVEY, &[summary("1", 1.0), no_rt]);
        let report = compute_statistics(&records, &survey, &ReportConfig::default());

        assert_eq!(report.accuracy.unwrap().n, 2);
        assert_eq!(report.avg_rt.unwrap().n, 1);
    }

    #[test]
    fn test_report_serialization() {
        let (records, survey) = merged(SURVEY, &[summary("1", 1.0)]);
        let stats = compute_statistics(&records, &survey, &ReportConfig::default());
        let report = AnalysisReport::new(Uuid::nil(), 2, stats);

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped_files"], 2);
        assert_eq!(json["participants"], 1);
        assert_eq!(json["group_counts"]["Tonal"], 1);
        assert_eq!(json["t_test"], "Not enough data for T-test.");
        assert_eq!(json["run_id"], "00000000-0000-0000-0000-000000000000");
    }
}
