//! `fraudgate score`: score one record or a file of records with the production model.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use fraudgate_scoring::artifacts::VersionedArtifactStore;
use fraudgate_scoring::io::read_records;
use fraudgate_scoring::monitoring::PredictionLog;
use fraudgate_scoring::record::TransactionRecord;
use fraudgate_scoring::scoring::{Prediction, ScoringContext};

use crate::util::write_output;

#[derive(Debug, Clone)]
pub enum ScoreInput {
    /// Inline JSON object.
    Record(String),
    /// `.json` (object or array of objects), `.csv` or `.tsv` file.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub model_dir: PathBuf,
    pub input: ScoreInput,
    pub log: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Parse the records to score. Every JSON element must be an object.
pub fn load_records(input: &ScoreInput) -> Result<Vec<TransactionRecord>> {
    match input {
        ScoreInput::Record(text) => {
            let value: Value =
                serde_json::from_str(text).context("Failed to parse --record as JSON")?;
            Ok(vec![TransactionRecord::from_json(&value)?])
        }
        ScoreInput::File(path) => {
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase());
            match ext.as_deref() {
                Some("json") => records_from_json_file(path),
                Some("csv") | Some("tsv") => read_records(path),
                _ => bail!(
                    "Input must be a .json, .csv or .tsv file: {}",
                    path.display()
                ),
            }
        }
    }
}

fn records_from_json_file(path: &Path) -> Result<Vec<TransactionRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input: {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse input: {}", path.display()))?;
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                TransactionRecord::from_json(item)
                    .with_context(|| format!("Invalid record at index {}", i))
            })
            .collect(),
        other => Ok(vec![TransactionRecord::from_json(&other)?]),
    }
}

/// Score every record. Any failing record fails the whole request; nothing is
/// logged or written in that case.
pub fn score(request: &ScoreRequest) -> Result<Vec<Prediction>> {
    let store = VersionedArtifactStore::new(&request.model_dir);
    let context = ScoringContext::load(&store).with_context(|| {
        format!(
            "Failed to load production model from {}",
            request.model_dir.display()
        )
    })?;

    let records = load_records(&request.input)?;
    if records.is_empty() {
        bail!("No records to score");
    }
    log::info!(
        "Scoring {} record(s) with model v{}",
        records.len(),
        context.version()
    );

    let predictions = context
        .score_batch(&records)
        .into_iter()
        .enumerate()
        .map(|(i, result)| result.map_err(|e| anyhow!("Record {}: {}", i, e)))
        .collect::<Result<Vec<_>>>()?;

    if let Some(log_path) = &request.log {
        let log = PredictionLog::new(log_path);
        for (record, prediction) in records.iter().zip(&predictions) {
            log.append(record, prediction)?;
        }
        log::debug!("Appended {} rows to {}", predictions.len(), log_path.display());
    }

    let mut lines = String::new();
    for prediction in &predictions {
        lines.push_str(&serde_json::to_string(prediction)?);
        lines.push('\n');
    }
    write_output(request.output.as_deref(), &lines)?;
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudgate_scoring::record::FieldValue;

    #[test]
    fn inline_record_must_be_an_object() {
        let records =
            load_records(&ScoreInput::Record(r#"{"TransactionAmt": 59.0, "card4": null}"#.into()))
                .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("card4"), Some(&FieldValue::Missing));

        assert!(load_records(&ScoreInput::Record("[1, 2]".into())).is_err());
        assert!(load_records(&ScoreInput::Record("not json".into())).is_err());
    }

    #[test]
    fn json_file_accepts_object_or_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[{"TransactionAmt": 10.0}, {"TransactionAmt": 20.0, "ProductCD": "W"}]"#,
        )
        .unwrap();
        assert_eq!(load_records(&ScoreInput::File(path.clone())).unwrap().len(), 2);

        std::fs::write(&path, r#"{"TransactionAmt": 10.0}"#).unwrap();
        assert_eq!(load_records(&ScoreInput::File(path)).unwrap().len(), 1);

        let bad = dir.path().join("batch.txt");
        std::fs::write(&bad, "").unwrap();
        assert!(load_records(&ScoreInput::File(bad)).is_err());
    }
}
