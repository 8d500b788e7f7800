//! Serving-time schema gate between the preprocessor and the classifier.
//!
//! Three independent records of the feature schema exist for a model version:
//! the preprocessor's frozen `feature_columns`, the persisted expected-feature
//! list, and the names the classifier recorded when it was trained. The contract
//! refuses to exist unless they agree, and refuses every request whose encoded
//! columns do not match the expected list exactly.
use log::{debug, trace, warn};
use ndarray::{Array2, Axis};

use crate::error::{Result, ScoringError};
use crate::frame::{FeatureMatrix, ModelInput};
use crate::schema::FeatureSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringContract {
    expected: FeatureSchema,
}

impl ScoringContract {
    /// Cross-check all schema sources. Any disagreement is a `SchemaMismatch`;
    /// no source is trusted over another.
    pub fn new(
        expected: FeatureSchema,
        preprocessor_columns: &FeatureSchema,
        classifier_features: Option<&[String]>,
    ) -> Result<Self> {
        if expected.is_empty() {
            return Err(ScoringError::Precondition(
                "expected feature list is empty".to_string(),
            ));
        }

        expected.ensure_matches(
            preprocessor_columns.columns(),
            "preprocessor feature_columns vs expected feature list",
        )?;

        match classifier_features {
            Some(names) => expected.ensure_matches(
                names,
                "classifier feature names vs expected feature list",
            )?,
            None => warn!(
                "classifier does not record feature names; checking preprocessor and feature list only"
            ),
        }

        Ok(ScoringContract { expected })
    }

    pub fn expected(&self) -> &FeatureSchema {
        &self.expected
    }

    /// Validate an encoded matrix and cast it to the labelled `f32` input the
    /// classifier consumes.
    pub fn validate(&self, matrix: &FeatureMatrix) -> Result<ModelInput> {
        let expected = self.expected.columns();

        let diff = self.expected.diff(matrix.columns());
        if !diff.missing.is_empty() || !diff.extra.is_empty() || matrix.ncols() != expected.len()
        {
            return Err(diff.into_error("scoring contract"));
        }

        let indices: Vec<usize> = expected
            .iter()
            .map(|name| matrix.column_index(name))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.expected.diff(matrix.columns()).into_error("scoring contract"))?;
        if indices.iter().enumerate().any(|(pos, &idx)| pos != idx) {
            debug!("reordering encoded columns to the expected model order");
        }

        let reordered_names: Vec<String> =
            indices.iter().map(|&i| matrix.columns()[i].clone()).collect();
        self.expected
            .ensure_matches(&reordered_names, "model input order after reindex")?;

        let reordered = matrix.values().select(Axis(1), &indices);
        let input = cast_to_f32(&reordered, expected)?;
        trace!(
            "cast {}x{} feature matrix to f32 model input",
            input.nrows(),
            input.ncols()
        );
        ModelInput::new(reordered_names, input)
    }
}

fn cast_to_f32(values: &Array2<f64>, columns: &[String]) -> Result<Array2<f32>> {
    for ((row, col), &v) in values.indexed_iter() {
        if !v.is_finite() || v.abs() > f64::from(f32::MAX) {
            return Err(ScoringError::TypeCoercion {
                column: columns[col].clone(),
                row: Some(row),
                detail: format!("value {} is not representable as f32", v),
            });
        }
    }
    Ok(values.mapv(|v| v as f32))
}
