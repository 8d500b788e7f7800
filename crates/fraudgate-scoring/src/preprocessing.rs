//! The fitted encoding pipeline persisted with every model version.
//!
//! `Preprocessor` composes the [`FrequencyEncoder`], the [`SchemaAligner`] and the
//! [`Imputer`]. `fit` learns the frequency maps, freezes the encoded column list
//! and learns medians; `transform` replays exactly those steps so every output
//! carries the frozen column list, whatever shape the input had.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::encoding::{FrequencyEncoder, FrequencyMap};
use crate::error::{Result, ScoringError};
use crate::frame::{FeatureMatrix, Frame};
use crate::imputation::Imputer;
use crate::schema::{FeatureSchema, SchemaAligner};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedState {
    input_columns: Vec<String>,
    encoder: FrequencyEncoder,
    feature_columns: FeatureSchema,
    imputer: Imputer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    state: Option<FittedState>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Fit on a training frame (label excluded). Fitting twice is an error; use
    /// [`Preprocessor::refit`] to replace a fitted state deliberately.
    pub fn fit(&mut self, frame: &Frame) -> Result<()> {
        if self.is_fitted() {
            return Err(ScoringError::Precondition(
                "preprocessor is already fitted; call refit to replace its state".to_string(),
            ));
        }
        if frame.nrows() == 0 {
            return Err(ScoringError::Precondition(
                "cannot fit preprocessor on an empty frame".to_string(),
            ));
        }

        let encoder = FrequencyEncoder::fit(frame);
        let encoded = encoder.encode(frame);
        let feature_columns = FeatureSchema::new(encoded.column_names());
        let imputer = Imputer::fit(&encoded)?;

        info!(
            "Fitted preprocessor on {} rows: {} categorical columns, {} feature columns",
            frame.nrows(),
            encoder.categorical_columns().len(),
            feature_columns.len()
        );
        debug!("feature columns: {:?}", feature_columns.columns());

        self.state = Some(FittedState {
            input_columns: frame.column_names(),
            encoder,
            feature_columns,
            imputer,
        });
        Ok(())
    }

    /// Discard any fitted state and fit again.
    pub fn refit(&mut self, frame: &Frame) -> Result<()> {
        self.state = None;
        self.fit(frame)
    }

    /// Encode with the stored maps, reindex to the frozen feature columns and
    /// impute with the stored medians. Row order is preserved.
    pub fn transform(&self, frame: &Frame) -> Result<FeatureMatrix> {
        let state = self.fitted()?;

        let unknown: Vec<String> = frame
            .column_names()
            .into_iter()
            .filter(|c| !state.input_columns.contains(c))
            .collect();
        if !unknown.is_empty() {
            debug!("ignoring fields unknown at fit time: {:?}", unknown);
        }

        let encoded = state.encoder.encode(frame);
        let aligned = SchemaAligner::new(state.feature_columns.clone()).align(&encoded);
        let matrix = state.imputer.transform(&aligned)?;

        state
            .feature_columns
            .ensure_matches(matrix.columns(), "preprocessor output")?;
        Ok(matrix)
    }

    pub fn fit_transform(&mut self, frame: &Frame) -> Result<FeatureMatrix> {
        self.fit(frame)?;
        self.transform(frame)
    }

    /// The frozen, ordered list of encoded feature columns.
    pub fn feature_columns(&self) -> Result<&FeatureSchema> {
        Ok(&self.fitted()?.feature_columns)
    }

    pub fn input_columns(&self) -> Result<&[String]> {
        Ok(&self.fitted()?.input_columns)
    }

    pub fn categorical_columns(&self) -> Result<&[String]> {
        Ok(self.fitted()?.encoder.categorical_columns())
    }

    pub fn frequency_map(&self, column: &str) -> Result<Option<&FrequencyMap>> {
        Ok(self.fitted()?.encoder.frequency_map(column))
    }

    pub fn imputer_median(&self, column: &str) -> Result<Option<f64>> {
        Ok(self.fitted()?.imputer.median(column))
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or_else(|| {
            ScoringError::Precondition("preprocessor must be fitted before use".to_string())
        })
    }
}
