//! Tabular artifact writers
//!
//! Writes the merged per-participant table and the detailed per-trial table
//! as comma-separated text. Undefined numbers and unmatched survey cells are
//! written as empty cells.

use crate::error::AnalysisError;
use crate::schema::SurveyTable;
use crate::summary::{CORRECT_RESPONSE_FIELD, RESPONSE_FIELD};
use crate::types::{MergedRecord, StimulusTrial};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Summary columns, in output order, ahead of the survey columns
pub const SUMMARY_COLUMNS: [&str; 6] = [
    "participant_id",
    "total_correct",
    "total_responses",
    "accuracy",
    "avg_rt",
    "participant_id_clean",
];

/// Suffix appended to a survey column whose name collides with a summary column
pub const SURVEY_COLLISION_SUFFIX: &str = "_survey";

/// Header row of the merged table
pub fn merged_header(survey: &SurveyTable) -> Vec<String> {
    let mut header: Vec<String> = SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in &survey.columns {
        if SUMMARY_COLUMNS.contains(&column.as_str()) {
            header.push(format!("{}{}", column, SURVEY_COLLISION_SUFFIX));
        } else {
            header.push(column.clone());
        }
    }
    header
}

/// Write the merged table to `path`
pub fn write_merged(
    path: &Path,
    records: &[MergedRecord],
    survey: &SurveyTable,
) -> Result<(), AnalysisError> {
    write_merged_to(File::create(path)?, records, survey)
}

/// Write the merged table to any sink
pub fn write_merged_to<W: Write>(
    sink: W,
    records: &[MergedRecord],
    survey: &SurveyTable,
) -> Result<(), AnalysisError> {
    let mut wtr = csv::Writer::from_writer(sink);
    wtr.write_record(merged_header(survey))?;

    for record in records {
        let s = &record.summary;
        let mut row = vec![
            s.participant_id.clone(),
            s.total_correct.to_string(),
            s.total_responses.to_string(),
            format_optional(s.accuracy),
            format_optional(s.avg_rt),
            s.participant_id_clean.clone(),
        ];
        row.extend(
            (0..survey.columns.len())
                .map(|i| record.survey_value(i).unwrap_or_default().to_string()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Header row of the detailed table
pub fn detailed_header(stimulus_fields: &[String]) -> Vec<String> {
    let mut header = vec!["participant_id".to_string()];
    header.extend(stimulus_fields.iter().cloned());
    header.push(CORRECT_RESPONSE_FIELD.to_string());
    header.push(RESPONSE_FIELD.to_string());
    header.push("is_correct".to_string());
    header
}

/// Write every stimulus trial to `path`
pub fn write_detailed(
    path: &Path,
    trials: &[StimulusTrial],
    stimulus_fields: &[String],
) -> Result<(), AnalysisError> {
    write_detailed_to(File::create(path)?, trials, stimulus_fields)
}

/// Write every stimulus trial to any sink
pub fn write_detailed_to<W: Write>(
    sink: W,
    trials: &[StimulusTrial],
    stimulus_fields: &[String],
) -> Result<(), AnalysisError> {
    let mut wtr = csv::Writer::from_writer(sink);
    wtr.write_record(detailed_header(stimulus_fields))?;

    for trial in trials {
        let mut row = vec![trial.participant_id.clone()];
        row.extend(stimulus_fields.iter().map(|f| trial.row.get(f).to_string()));
        row.push(trial.row.get(CORRECT_RESPONSE_FIELD).to_string());
        row.push(trial.row.get(RESPONSE_FIELD).to_string());
        row.push(if trial.is_correct { "True" } else { "False" }.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
