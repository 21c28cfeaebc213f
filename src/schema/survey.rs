//! Survey export schema
//!
//! The survey export is one row per respondent with a join-key column holding
//! the study result id. Spreadsheet round-trips tend to leave stray whitespace
//! in header names and turn integer ids into floats (`12345.0`), so both are
//! normalized on load.

use super::trial::check_row_width;
use crate::error::AnalysisError;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Default name of the survey join-key column
pub const DEFAULT_SURVEY_KEY_COLUMN: &str = "jatosStudyResultId";

/// One survey respondent
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    /// Normalized join key
    pub key: String,
    /// Cell text aligned with [`SurveyTable::columns`]; the key cell holds the
    /// normalized key
    pub values: Vec<String>,
}

/// Loaded survey export
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyTable {
    /// Trimmed column headers in file order
    pub columns: Vec<String>,
    /// Position of the join-key column in `columns`
    pub key_index: usize,
    pub records: Vec<SurveyRecord>,
}

impl SurveyTable {
    /// Load the survey export at `path`, failing with [`AnalysisError::Load`]
    /// if it is absent, not tabular text, or has no `key_column`.
    pub fn load(path: &Path, key_column: &str) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::load(path, e))?;
        let table =
            Self::from_reader(file, key_column).map_err(|e| AnalysisError::load(path, e))?;
        debug!(
            path = %path.display(),
            records = table.records.len(),
            columns = table.columns.len(),
            "loaded survey"
        );
        Ok(table)
    }

    /// Parse a survey export from any CSV source
    pub fn from_reader<R: Read>(reader: R, key_column: &str) -> Result<Self, AnalysisError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(clean_header).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(AnalysisError::Parse("survey has no header row".to_string()));
        }

        let key_index = columns
            .iter()
            .position(|c| c == key_column)
            .ok_or_else(|| AnalysisError::Parse(format!("missing key column '{}'", key_column)))?;

        let mut records = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            check_row_width(idx, record.len(), columns.len())?;
            let mut values: Vec<String> = (0..columns.len())
                .map(|i| record.get(i).unwrap_or_default().to_string())
                .collect();
            let key = normalize_survey_key(&values[key_index]);
            values[key_index] = key.clone();
            records.push(SurveyRecord { key, values });
        }

        Ok(SurveyTable {
            columns,
            key_index,
            records,
        })
    }

    /// Index of a column by its trimmed name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Map each join key to the positions of the records carrying it, in file order
    pub fn key_lookup(&self) -> HashMap<&str, Vec<usize>> {
        let mut lookup: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, record) in self.records.iter().enumerate() {
            lookup.entry(record.key.as_str()).or_default().push(idx);
        }
        lookup
    }
}

/// Trim whitespace (and a stray byte-order mark) from a header name
fn clean_header(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}

/// Normalize a survey join key: trim and drop a trailing `.0` float artifact.
///
/// `"482910.0"` becomes `"482910"`; any other text passes through unchanged.
pub fn normalize_survey_key(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_survey_key() {
        assert_eq!(normalize_survey_key("482910.0"), "482910");
        assert_eq!(normalize_survey_key("482910"), "482910");
        assert_eq!(normalize_survey_key(" 482910.0 "), "482910");
        assert_eq!(normalize_survey_key("pilot-7"), "pilot-7");
        assert_eq!(normalize_survey_key(""), "");
    }

    #[test]
    fn test_headers_are_trimmed() {
        let csv = "id, jatosStudyResultId ,\" How old are you? \"\n1,482910.0,24\n";
        let survey = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN).unwrap();

        assert_eq!(
            survey.columns,
            vec!["id", "jatosStudyResultId", "How old are you?"]
        );
        assert_eq!(survey.key_index, 1);
        assert_eq!(survey.records[0].key, "482910");
        assert_eq!(survey.records[0].values, vec!["1", "482910", "24"]);
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let csv = "\u{feff}jatosStudyResultId,age\n17,30\n";
        let survey = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN).unwrap();
        assert_eq!(survey.key_index, 0);
        assert_eq!(survey.records[0].key, "17");
    }

    #[test]
    fn test_missing_key_column() {
        let csv = "id,age\n1,24\n";
        let result = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN);
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = SurveyTable::load(
            Path::new("/nonexistent/survey.csv"),
            DEFAULT_SURVEY_KEY_COLUMN,
        );
        assert!(matches!(result, Err(AnalysisError::Load { .. })));
    }

    #[test]
    fn test_short_rows_padded() {
        let csv = "jatosStudyResultId,age,lang\n5,40\n";
        let survey = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN).unwrap();
        assert_eq!(survey.records[0].values, vec!["5", "40", ""]);
    }

    #[test]
    fn test_long_rows_rejected() {
        let csv = "jatosStudyResultId,age\n5,40,EXTRA\n";
        let result = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN);
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_unparsable_file_is_load_error() {
        let tmp = TempDir::new().unwrap();

        let wide = tmp.path().join("wide.csv");
        fs::write(&wide, "jatosStudyResultId,age\n5,40\n6,41,EXTRA\n").unwrap();
        let result = SurveyTable::load(&wide, DEFAULT_SURVEY_KEY_COLUMN);
        assert!(matches!(result, Err(AnalysisError::Load { .. })));

        let binary = tmp.path().join("binary.csv");
        fs::write(&binary, b"jatosStudyResultId,age\n\xff\xfe\x00,40\n").unwrap();
        let result = SurveyTable::load(&binary, DEFAULT_SURVEY_KEY_COLUMN);
        assert!(matches!(result, Err(AnalysisError::Load { .. })));
    }

    #[test]
    fn test_key_lookup_keeps_duplicates_in_order() {
        let csv = "jatosStudyResultId,answer\n9,a\n9.0,b\n10,c\n";
        let survey = SurveyTable::from_reader(csv.as_bytes(), DEFAULT_SURVEY_KEY_COLUMN).unwrap();
        let lookup = survey.key_lookup();
        assert_eq!(lookup["9"], vec![0, 1]);
        assert_eq!(lookup["10"], vec![2]);
    }
}
