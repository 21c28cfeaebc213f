//! Trial log schema
//!
//! Trial logs are written by the experiment components, and different
//! experiment variants log different columns. Rows are therefore kept as a
//! mapping from column name to a tagged cell value, and every lookup yields an
//! explicit [`FieldValue::Missing`] instead of failing.

use crate::error::AnalysisError;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Cell contents treated as missing data
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#NA", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "-nan",
    "-NaN",
];

/// A single cell of a trial log
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Missing,
}

static MISSING: FieldValue = FieldValue::Missing;

impl FieldValue {
    /// Infer a lone cell value from raw CSV text
    pub fn parse(raw: &str) -> Self {
        Self::parse_in_column(raw, parse_number(raw).is_some())
    }

    /// Parse a cell whose column type is already known. In a text column,
    /// numeric-looking cells stay text.
    pub fn parse_in_column(raw: &str, numeric_column: bool) -> Self {
        if is_na(raw) {
            return FieldValue::Missing;
        }
        match parse_number(raw) {
            Some(n) if numeric_column => FieldValue::Number(n),
            _ => FieldValue::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    /// Numeric coercion: numbers pass through, numeric-looking text is parsed,
    /// anything else is missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_number(s),
            FieldValue::Missing => None,
        }
    }

    /// Interpret the cell as a correctness indicator (true = 1, false = 0).
    ///
    /// Non-zero numbers (numeric text included) and `true` count as correct;
    /// missing or unrecognised text counts as incorrect.
    pub fn as_indicator(&self) -> bool {
        match self {
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => {
                s.trim().eq_ignore_ascii_case("true") || parse_number(s).is_some_and(|n| n != 0.0)
            }
            FieldValue::Missing => false,
        }
    }

    /// Strict value equality: numbers compare numerically, text compares
    /// case-sensitively, and a missing cell never equals anything.
    pub fn strict_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Case-insensitive substring match against the cell's text form
    pub fn contains_marker(&self, marker_lower: &str) -> bool {
        match self {
            FieldValue::Missing => false,
            value => value.to_string().to_lowercase().contains(marker_lower),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Missing => Ok(()),
        }
    }
}

/// One row of a participant's trial log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrialRow {
    fields: HashMap<String, FieldValue>,
}

impl RawTrialRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Look up a field, yielding [`FieldValue::Missing`] when absent
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&MISSING)
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.values()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for RawTrialRow {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A parsed trial log: one header row shared by every row of the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawTrialRow>,
}

impl TrialTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a trial log from disk.
    ///
    /// Returns `Ok(None)` when the file has no header at all (zero bytes or
    /// whitespace only).
    pub fn from_path(path: &Path) -> Result<Option<Self>, AnalysisError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a trial log from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Option<Self>, AnalysisError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Ok(None);
        }
        let columns = dedupe_columns(headers.iter());

        let mut records = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            check_row_width(idx, record.len(), columns.len())?;
            records.push(record);
        }

        // A column is numeric only when every non-missing cell parses as a number
        let numeric: Vec<bool> = (0..columns.len())
            .map(|i| {
                records
                    .iter()
                    .filter_map(|r| r.get(i))
                    .all(|cell| is_na(cell) || parse_number(cell).is_some())
            })
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let value = record.get(i).map_or(FieldValue::Missing, |cell| {
                            FieldValue::parse_in_column(cell, numeric[i])
                        });
                        (col.clone(), value)
                    })
                    .collect::<RawTrialRow>()
            })
            .collect();

        Ok(Some(TrialTable { columns, rows }))
    }
}

fn is_na(raw: &str) -> bool {
    NA_VALUES.contains(&raw) || NA_VALUES.contains(&raw.trim())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Reject a data row wider than its header. `idx` is the zero-based data row.
pub(crate) fn check_row_width(
    idx: usize,
    fields: usize,
    header: usize,
) -> Result<(), AnalysisError> {
    if fields > header {
        return Err(AnalysisError::Parse(format!(
            "row {} has {} fields, header has {}",
            idx + 2,
            fields,
            header
        )));
    }
    Ok(())
}

/// Repeated header names get a `.N` suffix so every column stays addressable
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for header in headers {
        let name = header.to_string();
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            columns.push(name);
        } else {
            columns.push(format!("{}.{}", name, count));
        }
        *count += 1;
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_inference() {
        assert_eq!(FieldValue::parse("500"), FieldValue::Number(500.0));
        assert_eq!(FieldValue::parse("0.25"), FieldValue::Number(0.25));
        assert_eq!(
            FieldValue::parse("stim_03.wav"),
            FieldValue::Text("stim_03.wav".to_string())
        );
        assert_eq!(FieldValue::parse(""), FieldValue::Missing);
        assert_eq!(FieldValue::parse("NaN"), FieldValue::Missing);
        assert_eq!(FieldValue::parse("null"), FieldValue::Missing);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(FieldValue::Number(612.0).as_f64(), Some(612.0));
        assert_eq!(FieldValue::Text(" 480 ".to_string()).as_f64(), Some(480.0));
        assert_eq!(FieldValue::Text("slow".to_string()).as_f64(), None);
        assert_eq!(FieldValue::Missing.as_f64(), None);
    }

    #[test]
    fn test_indicator() {
        assert!(FieldValue::Number(1.0).as_indicator());
        assert!(!FieldValue::Number(0.0).as_indicator());
        assert!(FieldValue::Text("true".to_string()).as_indicator());
        assert!(FieldValue::Text("True".to_string()).as_indicator());
        assert!(!FieldValue::Text("false".to_string()).as_indicator());
        assert!(FieldValue::Text("1".to_string()).as_indicator());
        assert!(!FieldValue::Text("0".to_string()).as_indicator());
        assert!(!FieldValue::Missing.as_indicator());
    }

    #[test]
    fn test_strict_eq() {
        let f = FieldValue::Text("f".to_string());
        let upper_f = FieldValue::Text("F".to_string());
        assert!(f.strict_eq(&f.clone()));
        assert!(!f.strict_eq(&upper_f));
        assert!(FieldValue::Number(1.0).strict_eq(&FieldValue::Number(1.0)));
        assert!(!FieldValue::Number(1.0).strict_eq(&FieldValue::Text("1.0".to_string())));
        assert!(!FieldValue::Missing.strict_eq(&FieldValue::Missing));
    }

    #[test]
    fn test_missing_field_lookup() {
        let row: RawTrialRow = [("sound1", FieldValue::parse("stim_a.wav"))]
            .into_iter()
            .collect();
        assert_eq!(row.get("sound1"), &FieldValue::Text("stim_a.wav".to_string()));
        assert!(row.get("sound_2").is_missing());
    }

    #[test]
    fn test_read_table() {
        let csv = "sound1,correct,average_response_time\nstim_a.wav,1,500\nfiller.wav,0,\n";
        let table = TrialTable::from_reader(csv.as_bytes()).unwrap().unwrap();

        assert_eq!(table.columns, vec!["sound1", "correct", "average_response_time"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("correct"), &FieldValue::Number(1.0));
        assert!(table.rows[1].get("average_response_time").is_missing());
    }

    #[test]
    fn test_column_types_inferred_per_column() {
        let csv = "response,correct_response,rt\n1,1,500\nf,2,slow\n";
        let table = TrialTable::from_reader(csv.as_bytes()).unwrap().unwrap();

        // "f" makes response a text column, so its "1" stays text
        assert_eq!(table.rows[0].get("response"), &FieldValue::Text("1".to_string()));
        assert_eq!(table.rows[0].get("correct_response"), &FieldValue::Number(1.0));
        assert!(!table.rows[0]
            .get("response")
            .strict_eq(table.rows[0].get("correct_response")));
        assert_eq!(table.rows[0].get("rt").as_f64(), Some(500.0));
    }

    #[test]
    fn test_read_empty_input() {
        assert!(TrialTable::from_reader("".as_bytes()).unwrap().is_none());
        assert!(TrialTable::from_reader("\n\n".as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_read_header_only() {
        let table = TrialTable::from_reader("sound1,correct\n".as_bytes())
            .unwrap()
            .unwrap();
        assert!(table.is_empty());
        assert!(table.has_column("correct"));
    }

    #[test]
    fn test_short_rows_are_padded_and_long_rows_rejected() {
        let table = TrialTable::from_reader("a,b,c\n1\n".as_bytes())
            .unwrap()
            .unwrap();
        assert!(table.rows[0].get("c").is_missing());

        assert!(TrialTable::from_reader("a,b\n1,2,3\n".as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_headers() {
        let table = TrialTable::from_reader("rt,rt\n1,2\n".as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(table.columns, vec!["rt", "rt.1"]);
        assert_eq!(table.rows[0].get("rt.1"), &FieldValue::Number(2.0));
    }
}
