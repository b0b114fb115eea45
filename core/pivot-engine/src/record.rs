//! FILENAME: core/pivot-engine/src/record.rs
//! Source records - the immutable input rows the engine aggregates.
//!
//! The ingestion layer hands over an ordered list of headers and a collection
//! of records. Each record maps a column name to a scalar value. The engine
//! never mutates records; every calculation reads them by reference.

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// SCALAR VALUES
// ============================================================================

/// A single cell value from the source data.
///
/// Serialized untagged so that JSON `null`, numbers and strings map directly
/// onto `Empty`, `Number` and `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ScalarValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl ScalarValue {
    /// True for `Empty` and for text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            ScalarValue::Empty => true,
            ScalarValue::Number(_) => false,
            ScalarValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// Returns the numeric content of this value, if it has any.
    /// Text is parsed after trimming. Non-finite results are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            ScalarValue::Empty => return None,
            ScalarValue::Number(n) => *n,
            ScalarValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if n.is_finite() {
            Some(n)
        } else {
            None
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Empty => Ok(()),
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Number(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Number(value as f64)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ScalarValue::Empty, Into::into)
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One source row: column name -> value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: FxHashMap<String, ScalarValue>,
}

impl Record {
    /// Builds a record from (column, value) pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<ScalarValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs.into_iter().collect()
    }

    /// Value of a column. Absent columns yield `None`.
    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// SOURCE DATASET
// ============================================================================

/// The dataset handed over by the ingestion collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PivotSource {
    /// Ordered column names.
    pub headers: Vec<String>,

    /// All source records, in ingestion order.
    pub records: Vec<Record>,
}

impl PivotSource {
    pub fn new(headers: Vec<String>, records: Vec<Record>) -> Self {
        PivotSource { headers, records }
    }

    /// Builds a dataset whose headers are the sorted union of record columns.
    pub fn from_records(records: Vec<Record>) -> Self {
        let headers: BTreeSet<&str> = records.iter().flat_map(Record::columns).collect();
        let headers = headers.into_iter().map(str::to_string).collect();
        PivotSource { headers, records }
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        assert!(ScalarValue::Empty.is_blank());
        assert!(ScalarValue::from("   ").is_blank());
        assert!(!ScalarValue::from("x").is_blank());
        assert!(!ScalarValue::from(0.0).is_blank());
    }

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(ScalarValue::from(12.5).as_number(), Some(12.5));
        assert_eq!(ScalarValue::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(ScalarValue::from("abc").as_number(), None);
        assert_eq!(ScalarValue::from("NaN").as_number(), None);
        assert_eq!(ScalarValue::from(f64::INFINITY).as_number(), None);
        assert_eq!(ScalarValue::Empty.as_number(), None);
    }

    #[test]
    fn test_display_drops_trailing_zero() {
        assert_eq!(ScalarValue::from(10.0).to_string(), "10");
        assert_eq!(ScalarValue::from(10.5).to_string(), "10.5");
        assert_eq!(ScalarValue::Empty.to_string(), "");
    }

    #[test]
    fn test_from_records_infers_sorted_headers() {
        let source = PivotSource::from_records(vec![
            Record::from_pairs([("Region", "East")]),
            Record::from_pairs([("Product", ScalarValue::from("A")), ("Sales", 3.0.into())]),
        ]);
        assert_eq!(source.headers, vec!["Product", "Region", "Sales"]);
        assert!(source.has_header("Sales"));
        assert_eq!(source.record_count(), 2);
    }

    #[test]
    fn test_record_json_shape() {
        let record: Record =
            serde_json::from_str(r#"{"Region":"East","Sales":20,"Note":null}"#).unwrap();
        assert_eq!(record.get("Region"), Some(&ScalarValue::from("East")));
        assert_eq!(record.get("Sales"), Some(&ScalarValue::Number(20.0)));
        assert_eq!(record.get("Note"), Some(&ScalarValue::Empty));
        assert_eq!(record.get("Missing"), None);
    }
}
