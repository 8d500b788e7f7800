//! Append-only CSV log of served predictions.
//!
//! Header: `timestamp,fraud_probability,decision,model_version,features`.
//! `features` holds the raw request as a JSON object.
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::record::{TransactionRecord, TRANSACTION_AMT};
use crate::scoring::{Decision, Prediction};

pub const LOG_HEADER: [&str; 5] = [
    "timestamp",
    "fraud_probability",
    "decision",
    "model_version",
    "features",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub fraud_probability: f64,
    pub decision: Decision,
    pub model_version: u32,
    pub features: Value,
}

impl PredictionLogEntry {
    pub fn new(record: &TransactionRecord, prediction: &Prediction) -> Self {
        PredictionLogEntry {
            timestamp: Utc::now(),
            fraud_probability: round6(prediction.fraud_probability),
            decision: prediction.decision,
            model_version: prediction.model_version,
            features: record.to_json(),
        }
    }

    /// `TransactionAmt` from the logged request, when present and numeric.
    pub fn transaction_amount(&self) -> Option<f64> {
        self.features
            .get(TRANSACTION_AMT)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    fn to_row(&self) -> [String; 5] {
        [
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.fraud_probability.to_string(),
            self.decision.to_string(),
            self.model_version.to_string(),
            self.features.to_string(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Option<Self> {
        if row.len() != LOG_HEADER.len() {
            return None;
        }
        let timestamp = DateTime::parse_from_rfc3339(row.get(0)?.trim())
            .ok()?
            .with_timezone(&Utc);
        let fraud_probability = row.get(1)?.trim().parse::<f64>().ok()?;
        if !(0.0..=1.0).contains(&fraud_probability) {
            return None;
        }
        let decision = row.get(2)?.parse::<Decision>().ok()?;
        let model_version = row
            .get(3)?
            .trim()
            .trim_start_matches('v')
            .parse::<u32>()
            .ok()?;
        let features: Value = serde_json::from_str(row.get(4)?).ok()?;
        if !features.is_object() {
            return None;
        }
        Some(PredictionLogEntry {
            timestamp,
            fraud_probability,
            decision,
            model_version,
            features,
        })
    }
}

fn round6(p: f64) -> f64 {
    (p * 1e6).round() / 1e6
}

/// Entries read back from a log, plus the number of rows that could not be parsed.
#[derive(Debug, Clone, Default)]
pub struct LogContents {
    pub entries: Vec<PredictionLogEntry>,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PredictionLog {
    path: PathBuf,
}

impl PredictionLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        PredictionLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &TransactionRecord, prediction: &Prediction) -> Result<()> {
        self.append_entry(&PredictionLogEntry::new(record, prediction))
    }

    /// Append one row, writing the header first when the file is new or empty.
    pub fn append_entry(&self, entry: &PredictionLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log dir: {}", parent.display()))?;
        }
        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open prediction log: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(LOG_HEADER)?;
        }
        writer.write_record(entry.to_row())?;
        writer.flush()?;
        Ok(())
    }

    /// Read every well-formed row. Malformed rows are skipped and counted; a log
    /// that does not exist yet reads as empty.
    pub fn read(&self) -> Result<LogContents> {
        if !self.path.exists() {
            debug!("No prediction log at {}", self.path.display());
            return Ok(LogContents::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open prediction log: {}", self.path.display()))?;

        let mut contents = LogContents::default();
        for (row_idx, result) in reader.records().enumerate() {
            match result.ok().as_ref().and_then(PredictionLogEntry::from_row) {
                Some(entry) => contents.entries.push(entry),
                None => {
                    debug!("Skipping malformed log row {}", row_idx + 1);
                    contents.skipped += 1;
                }
            }
        }
        if contents.skipped > 0 {
            warn!(
                "Skipped {} malformed rows in {}",
                contents.skipped,
                self.path.display()
            );
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use std::io::Write;

    fn prediction(p: f64) -> Prediction {
        Prediction {
            fraud_probability: p,
            decision: crate::scoring::DecisionPolicy::default().decide(p),
            model_version: 2,
        }
    }

    #[test]
    fn append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = PredictionLog::new(dir.path().join("logs/predictions.csv"));
        let record = TransactionRecord::new()
            .with("TransactionAmt", FieldValue::Number(59.0))
            .with("card4", FieldValue::Text("visa, debit".to_string()));

        log.append(&record, &prediction(0.123_456_789)).unwrap();
        log.append(&record, &prediction(0.7)).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.starts_with("timestamp,fraud_probability,decision,model_version,features\n"));
        assert_eq!(text.matches("timestamp").count(), 1);

        let contents = log.read().unwrap();
        assert_eq!(contents.skipped, 0);
        assert_eq!(contents.entries.len(), 2);
        assert_eq!(contents.entries[0].fraud_probability, 0.123457);
        assert_eq!(contents.entries[0].decision, Decision::Allow);
        assert_eq!(contents.entries[1].decision, Decision::Block);
        assert_eq!(contents.entries[1].model_version, 2);
        assert_eq!(contents.entries[0].transaction_amount(), Some(59.0));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "timestamp,fraud_probability,decision,model_version,features").unwrap();
        writeln!(
            f,
            "2024-05-01T10:00:00Z,0.2,allow,1,\"{{\"\"TransactionAmt\"\": 12.5}}\""
        )
        .unwrap();
        writeln!(f, "2024-05-01T10:00:01Z,0.2,allow,1").unwrap();
        writeln!(f, "not-a-time,0.2,allow,1,{{}}").unwrap();
        writeln!(f, "2024-05-01T10:00:02Z,0.9,deny,1,{{}}").unwrap();
        writeln!(
            f,
            "2024-05-01T10:00:03Z,0.9,block,v3,\"{{'TransactionAmt': 1.0}}\""
        )
        .unwrap();
        drop(f);

        let contents = PredictionLog::new(&path).read().unwrap();
        assert_eq!(contents.entries.len(), 1);
        assert_eq!(contents.skipped, 4);
        assert_eq!(contents.entries[0].transaction_amount(), Some(12.5));
    }
}
