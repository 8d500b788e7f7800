//! Tabular containers used between pipeline stages.
//!
//! * [`Frame`]: typed columns with explicit missing values (raw and encoded data).
//! * [`FeatureMatrix`]: dense `f64` matrix with labelled columns, no missing values.
//! * [`ModelInput`]: the labelled `f32` matrix handed to a classifier.
use ndarray::Array2;

use crate::error::{Result, ScoringError};
use crate::record::{FieldValue, TransactionRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: &str, values: Vec<Option<f64>>) -> Self {
        Column {
            name: name.to_string(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical(name: &str, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.to_string(),
            values: ColumnValues::Categorical(values),
        }
    }

    pub fn missing(name: &str, len: usize) -> Self {
        Column::numeric(name, vec![None; len])
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.values, ColumnValues::Categorical(_))
    }

    pub fn missing_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Pick rows by optional index; `None` yields a missing cell (left-join fill).
    pub fn gather(&self, indices: &[Option<usize>]) -> Column {
        let values = match &self.values {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(indices.iter().map(|i| i.and_then(|i| v[i])).collect())
            }
            ColumnValues::Categorical(v) => ColumnValues::Categorical(
                indices.iter().map(|i| i.and_then(|i| v[i].clone())).collect(),
            ),
        };
        Column {
            name: self.name.clone(),
            values,
        }
    }

    fn select_rows(&self, indices: &[usize]) -> Column {
        let values = match &self.values {
            ColumnValues::Numeric(v) => {
                ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        };
        Column {
            name: self.name.clone(),
            values,
        }
    }
}

/// Column-oriented table. All columns share the same row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    nrows: usize,
}

/// Category label of a number stored in a categorical column. Frame building and
/// frequency encoding both go through this so `123` and `"123"` are one category.
pub fn category_key(value: f64) -> String {
    value.to_string()
}

impl Frame {
    pub fn empty(nrows: usize) -> Self {
        Frame {
            columns: Vec::new(),
            nrows,
        }
    }

    pub fn from_columns(nrows: usize, columns: Vec<Column>) -> Result<Self> {
        let mut frame = Frame::empty(nrows);
        for column in columns {
            frame.set_column(column)?;
        }
        Ok(frame)
    }

    /// Build a frame from records. Columns appear in first-seen order; a column is
    /// categorical as soon as one non-missing value is text, and numbers found in a
    /// categorical column are kept as their string form.
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let mut names: Vec<&str> = Vec::new();
        for record in records {
            for (name, _) in record.iter() {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells: Vec<Option<&FieldValue>> =
                    records.iter().map(|r| r.get(name)).collect();
                let has_text = cells
                    .iter()
                    .any(|c| matches!(c, Some(FieldValue::Text(_))));
                if has_text {
                    let values = cells
                        .into_iter()
                        .map(|c| match c {
                            Some(FieldValue::Text(s)) => Some(s.clone()),
                            Some(FieldValue::Number(n)) => Some(category_key(*n)),
                            _ => None,
                        })
                        .collect();
                    Column::categorical(name, values)
                } else {
                    let values = cells
                        .into_iter()
                        .map(|c| c.and_then(FieldValue::as_f64))
                        .collect();
                    Column::numeric(name, values)
                }
            })
            .collect();

        Frame {
            columns,
            nrows: records.len(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Replace a column in place, or append it when absent.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if column.len() != self.nrows {
            return Err(ScoringError::Precondition(format!(
                "column '{}' has {} rows, frame has {}",
                column.name,
                column.len(),
                self.nrows
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        self.columns.retain(|c| !names.contains(&c.name));
    }

    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.iter().map(|c| c.select_rows(indices)).collect(),
            nrows: indices.len(),
        }
    }

    /// Fraction of missing cells in a column; 1.0 for an empty frame.
    pub fn missing_fraction(&self, name: &str) -> Option<f64> {
        let column = self.column(name)?;
        if self.nrows == 0 {
            return Some(1.0);
        }
        Some(column.missing_count() as f64 / self.nrows as f64)
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

/// Dense, fully numeric feature table with labelled columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(ScoringError::Precondition(format!(
                "{} column labels for a matrix with {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(FeatureMatrix { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.column_index(name)?;
        self.values.get((row, col)).copied()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|c| *c == from) {
            Some(c) => {
                *c = to.to_string();
                true
            }
            None => false,
        }
    }
}

/// Labelled `f32` matrix in exactly the column order a classifier was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    feature_names: Vec<String>,
    values: Array2<f32>,
}

impl ModelInput {
    pub fn new(feature_names: Vec<String>, values: Array2<f32>) -> Result<Self> {
        if feature_names.len() != values.ncols() {
            return Err(ScoringError::Precondition(format!(
                "{} feature names for a model input with {} columns",
                feature_names.len(),
                values.ncols()
            )));
        }
        Ok(ModelInput {
            feature_names,
            values,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row_vec(&self, row: usize) -> Vec<f32> {
        self.values.row(row).to_vec()
    }
}
