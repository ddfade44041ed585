// Record Parser
// Turns raw CSV rows (column name -> text) into typed patient records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw table row, keyed by header name
pub type RawRow = HashMap<String, String>;

pub const COL_AGE: &str = "age";
pub const COL_SEX: &str = "sex";
pub const COL_BMI: &str = "bmi";
pub const COL_CHILDREN: &str = "children";
pub const COL_SMOKER: &str = "smoker";
pub const COL_REGION: &str = "region";
pub const COL_CHARGES: &str = "charges";

/// Record - one patient entry
///
/// Numeric fields are `f64` so that a value that fails to parse can carry NaN
/// instead of dropping the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub age: f64,
    pub sex: String,
    pub bmi: f64,
    pub children: f64,
    pub charges: f64,
    pub is_smoker: bool,
    pub region: String,
}

impl Record {
    pub fn new(age: f64, bmi: f64, charges: f64, is_smoker: bool, region: &str) -> Self {
        Record {
            age,
            sex: String::new(),
            bmi,
            children: 0.0,
            charges,
            is_smoker,
            region: region.to_string(),
        }
    }

    /// Builder pattern: set sex
    pub fn with_sex(mut self, sex: &str) -> Self {
        self.sex = sex.to_string();
        self
    }

    /// Builder pattern: set number of children
    pub fn with_children(mut self, children: f64) -> Self {
        self.children = children;
        self
    }

    /// True when every numeric field holds a real number
    pub fn is_complete(&self) -> bool {
        [self.age, self.bmi, self.children, self.charges]
            .iter()
            .all(|v| !v.is_nan())
    }
}

/// A numeric field that did not parse and was stored as NaN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    /// 0-based data row index (header excluded)
    pub row: usize,
    pub column: String,
    pub value: Option<String>,
}

impl FieldWarning {
    pub fn describe(&self) -> String {
        match &self.value {
            Some(v) => format!("row {}: `{}` is not numeric ({:?})", self.row, self.column, v),
            None => format!("row {}: `{}` is missing", self.row, self.column),
        }
    }
}

/// Output of the parser: records in input order plus any field warnings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecords {
    pub records: Vec<Record>,
    pub warnings: Vec<FieldWarning>,
}

/// Parse a decimal field; anything unparsable becomes NaN
///
/// `f64::from_str` also takes "inf" and "nan"; those are not decimals.
pub fn parse_number(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

/// `smoker` is exactly "yes" after trimming (case-sensitive)
pub fn parse_smoker(raw: Option<&str>) -> bool {
    raw.map(|s| s.trim() == "yes").unwrap_or(false)
}

fn numeric_field(
    row: &RawRow,
    index: usize,
    column: &str,
    warnings: &mut Vec<FieldWarning>,
) -> f64 {
    let raw = row.get(column).map(String::as_str);
    let value = parse_number(raw);

    if value.is_nan() {
        warnings.push(FieldWarning {
            row: index,
            column: column.to_string(),
            value: raw.map(str::to_string),
        });
    }

    value
}

fn record_from_row(row: &RawRow, index: usize, warnings: &mut Vec<FieldWarning>) -> Record {
    Record {
        age: numeric_field(row, index, COL_AGE, warnings),
        sex: row.get(COL_SEX).cloned().unwrap_or_default(),
        bmi: numeric_field(row, index, COL_BMI, warnings),
        children: numeric_field(row, index, COL_CHILDREN, warnings),
        charges: numeric_field(row, index, COL_CHARGES, warnings),
        is_smoker: parse_smoker(row.get(COL_SMOKER).map(String::as_str)),
        region: row.get(COL_REGION).cloned().unwrap_or_default(),
    }
}

/// Parse rows into records, collecting a warning per unparsable numeric field
///
/// Never drops a row: `result.records.len() == rows.len()`.
pub fn parse_rows_with_warnings(rows: &[RawRow]) -> ParsedRecords {
    let mut warnings = Vec::new();

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| record_from_row(row, i, &mut warnings))
        .collect();

    for warning in &warnings {
        tracing::warn!("{}", warning.describe());
    }

    ParsedRecords { records, warnings }
}

/// Parse rows into records, preserving input order
pub fn parse_rows(rows: &[RawRow]) -> Vec<Record> {
    parse_rows_with_warnings(rows).records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_row(age: &str, smoker: &str, region: &str, charges: &str) -> RawRow {
        raw_row(&[
            ("age", age),
            ("sex", "female"),
            ("bmi", "27.9"),
            ("children", "0"),
            ("smoker", smoker),
            ("region", region),
            ("charges", charges),
        ])
    }

    #[test]
    fn test_parse_valid_row() {
        let rows = vec![full_row("19", "yes", "southwest", "16884.924")];

        let records = parse_rows(&rows);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.age, 19.0);
        assert_eq!(r.sex, "female");
        assert_eq!(r.bmi, 27.9);
        assert_eq!(r.children, 0.0);
        assert_eq!(r.charges, 16884.924);
        assert!(r.is_smoker);
        assert_eq!(r.region, "southwest");
        assert!(r.is_complete());
    }

    #[test]
    fn test_smoker_is_case_sensitive_and_trimmed() {
        assert!(parse_smoker(Some("yes")));
        assert!(parse_smoker(Some("  yes ")));
        assert!(!parse_smoker(Some("Yes")));
        assert!(!parse_smoker(Some("YES")));
        assert!(!parse_smoker(Some("no")));
        assert!(!parse_smoker(Some("")));
        assert!(!parse_smoker(None));
    }

    #[test]
    fn test_missing_smoker_column_is_false() {
        let rows = vec![raw_row(&[("age", "30"), ("charges", "100")])];

        let records = parse_rows(&rows);

        assert!(!records[0].is_smoker);
        assert_eq!(records[0].region, "");
    }

    #[test]
    fn test_unparsable_numeric_becomes_nan() {
        let rows = vec![
            full_row("forty", "no", "northeast", "1200.5"),
            full_row("33", "no", "northeast", ""),
        ];

        let parsed = parse_rows_with_warnings(&rows);

        // No row is dropped
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.records[0].age.is_nan());
        assert_eq!(parsed.records[0].charges, 1200.5);
        assert!(parsed.records[1].charges.is_nan());
        assert!(!parsed.records[0].is_complete());

        assert_eq!(parsed.warnings.len(), 2);
        assert_eq!(parsed.warnings[0].row, 0);
        assert_eq!(parsed.warnings[0].column, "age");
        assert_eq!(parsed.warnings[0].value.as_deref(), Some("forty"));
        assert_eq!(parsed.warnings[1].row, 1);
        assert_eq!(parsed.warnings[1].column, "charges");
    }

    #[test]
    fn test_missing_numeric_column_warns() {
        let rows = vec![raw_row(&[("age", "30"), ("smoker", "no")])];

        let parsed = parse_rows_with_warnings(&rows);

        assert!(parsed.records[0].bmi.is_nan());
        let missing: Vec<_> = parsed.warnings.iter().map(|w| w.column.as_str()).collect();
        assert_eq!(missing, vec!["bmi", "children", "charges"]);
        assert!(parsed.warnings.iter().all(|w| w.value.is_none()));
        assert!(parsed.warnings[0].describe().contains("missing"));
    }

    #[test]
    fn test_preserves_input_order() {
        let rows = vec![
            full_row("50", "no", "a", "1"),
            full_row("20", "no", "b", "2"),
            full_row("35", "no", "c", "3"),
        ];

        let regions: Vec<_> = parse_rows(&rows).into_iter().map(|r| r.region).collect();

        assert_eq!(regions, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_whitespace_around_numbers() {
        assert_eq!(parse_number(Some(" 42 ")), 42.0);
        assert_eq!(parse_number(Some("3.5")), 3.5);
        assert!(parse_number(Some("4 2")).is_nan());
        assert!(parse_number(None).is_nan());
    }

    #[test]
    fn test_non_decimal_float_words_are_rejected() {
        for word in ["inf", "-infinity", "Infinity", "NaN", "nan"] {
            assert!(parse_number(Some(word)).is_nan(), "{} should not parse", word);
        }

        let rows = vec![full_row("30", "no", "north", "inf")];
        let parsed = parse_rows_with_warnings(&rows);

        assert!(parsed.records[0].charges.is_nan());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].column, "charges");
        assert_eq!(parsed.warnings[0].value.as_deref(), Some("inf"));
    }
}
