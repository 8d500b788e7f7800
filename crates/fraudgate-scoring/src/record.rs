//! Raw transaction records as they arrive from callers and CSV files.
//!
//! A record is a mapping from field name to a scalar [`FieldValue`]. Absence is
//! represented explicitly with [`FieldValue::Missing`]; a missing amount is not
//! the same thing as an amount of zero.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScoringError};

pub const TRANSACTION_AMT: &str = "TransactionAmt";
pub const TRANSACTION_AMT_LOG: &str = "TransactionAmt_log";

/// Raw fields retained for modelling, in the order they are selected at training time.
pub const RAW_FEATURE_FIELDS: [&str; 11] = [
    "TransactionAmt",
    "ProductCD",
    "card1",
    "card2",
    "card3",
    "card4",
    "card5",
    "card6",
    "DeviceType",
    "P_emaildomain",
    "R_emaildomain",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Parse a raw CSV cell. Empty cells and `NA`/`NaN` markers are missing.
    pub fn parse_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return FieldValue::Missing;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "na" | "nan" | "null" | "none" => return FieldValue::Missing,
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => FieldValue::Number(v),
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }

    fn from_json(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(FieldValue::Missing),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).ok_or_else(|| {
                ScoringError::InvalidRecord(format!("field '{}' is not a finite number", field))
            }),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                Err(ScoringError::InvalidRecord(format!(
                    "field '{}' has unsupported value {}; expected number, string or null",
                    field, value
                )))
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

/// One transaction: field name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl TransactionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for constructing records in code.
    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON value. Anything other than an object is rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ScoringError::InvalidRecord(format!(
                "expected a JSON object of transaction fields, got {}",
                json_kind(value)
            ))
        })?;

        let mut record = TransactionRecord::new();
        for (field, v) in obj {
            record.insert(field, FieldValue::from_json(field, v)?);
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_cell_distinguishes_missing_numbers_and_text() {
        assert_eq!(FieldValue::parse_cell(""), FieldValue::Missing);
        assert_eq!(FieldValue::parse_cell("NaN"), FieldValue::Missing);
        assert_eq!(FieldValue::parse_cell(" 59.5 "), FieldValue::Number(59.5));
        assert_eq!(
            FieldValue::parse_cell("visa"),
            FieldValue::Text("visa".to_string())
        );
    }

    #[test]
    fn from_json_maps_null_to_missing() {
        let rec = TransactionRecord::from_json(&json!({
            "TransactionAmt": 59.0,
            "ProductCD": "W",
            "card2": null
        }))
        .unwrap();
        assert_eq!(rec.get("TransactionAmt"), Some(&FieldValue::Number(59.0)));
        assert_eq!(rec.get("card2"), Some(&FieldValue::Missing));
        assert_eq!(rec.get("card3"), None);
    }

    #[test]
    fn from_json_rejects_non_objects_and_booleans() {
        assert!(matches!(
            TransactionRecord::from_json(&json!([1, 2, 3])),
            Err(ScoringError::InvalidRecord(_))
        ));
        assert!(matches!(
            TransactionRecord::from_json(&json!({"card4": true})),
            Err(ScoringError::InvalidRecord(_))
        ));
    }

    #[test]
    fn json_snapshot_keeps_missing_as_null() {
        let rec = TransactionRecord::new()
            .with("TransactionAmt", FieldValue::Number(10.0))
            .with("card4", FieldValue::Missing);
        assert_eq!(rec.to_json(), json!({"TransactionAmt": 10.0, "card4": null}));
    }
}
