//! CSV readers for training tables and monitoring inputs.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use log::{debug, warn};

use crate::frame::{ColumnValues, Frame};
use crate::record::{FieldValue, TransactionRecord};

fn reader_for<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    let path = path.as_ref();
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    };
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))
}

fn read_rows<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<TransactionRecord>)> {
    let mut reader = reader_for(&path)?;
    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        records.push(row_to_record(&headers, &row));
    }
    debug!(
        "Read {} rows x {} columns from {}",
        records.len(),
        headers.len(),
        path.as_ref().display()
    );
    Ok((headers.iter().map(str::to_string).collect(), records))
}

fn row_to_record(headers: &StringRecord, row: &StringRecord) -> TransactionRecord {
    let mut record = TransactionRecord::new();
    for (name, cell) in headers.iter().zip(row.iter()) {
        record.insert(name, FieldValue::parse_cell(cell));
    }
    record
}

/// Read a delimited file (`.csv`, or `.tsv` by extension) into records. Every
/// header becomes a field in every record; empty and `NA` cells are missing.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRecord>> {
    read_rows(path).map(|(_, records)| records)
}

/// Read a delimited file into a typed [`Frame`], columns in file order.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let (headers, records) = read_rows(&path)?;
    // records keep fields sorted by name
    let mut by_name = Frame::from_records(&records);
    let mut frame = Frame::empty(records.len());
    for name in &headers {
        if let Some(column) = by_name.remove_column(name) {
            frame.set_column(column)?;
        }
    }
    Ok(frame)
}

/// Read one numeric column, skipping missing and non-numeric cells.
pub fn read_numeric_column<P: AsRef<Path>>(path: P, column: &str) -> Result<Vec<f64>> {
    let mut reader = reader_for(&path)?;
    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();
    let idx = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("Column '{}' not found in {}", column, path.as_ref().display()))?;

    let mut values = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        if let Some(v) = row.get(idx).and_then(|c| FieldValue::parse_cell(c).as_f64()) {
            values.push(v);
        }
    }
    Ok(values)
}

fn key_strings(frame: &Frame, on: &str) -> Result<Vec<Option<String>>> {
    let column = frame
        .column(on)
        .ok_or_else(|| anyhow!("Join column '{}' not found", on))?;
    Ok(match &column.values {
        ColumnValues::Numeric(v) => v.iter().map(|x| x.map(|x| x.to_string())).collect(),
        ColumnValues::Categorical(v) => v.clone(),
    })
}

/// Left join `right` onto `left` by the key column `on`. Left row order is kept;
/// unmatched rows get missing values for every right column. When the right table
/// repeats a key, the first occurrence wins.
pub fn left_join(left: &Frame, right: &Frame, on: &str) -> Result<Frame> {
    let left_keys = key_strings(left, on)?;
    let right_keys = key_strings(right, on)?;

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(right_keys.len());
    let mut duplicates = 0usize;
    for (row, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            if index.contains_key(key.as_str()) {
                duplicates += 1;
            } else {
                index.insert(key.as_str(), row);
            }
        }
    }
    if duplicates > 0 {
        warn!(
            "{} duplicate '{}' keys in joined table; keeping first occurrence",
            duplicates, on
        );
    }

    let matches: Vec<Option<usize>> = left_keys
        .iter()
        .map(|k| k.as_deref().and_then(|k| index.get(k).copied()))
        .collect();

    let mut joined = left.clone();
    for column in right.columns() {
        if column.name == on {
            continue;
        }
        if joined.contains(&column.name) {
            warn!(
                "Column '{}' exists in both tables; keeping the left one",
                column.name
            );
            continue;
        }
        joined.set_column(column.gather(&matches))?;
    }
    debug!(
        "Joined on '{}': {} of {} rows matched",
        on,
        matches.iter().filter(|m| m.is_some()).count(),
        matches.len()
    );
    Ok(joined)
}
