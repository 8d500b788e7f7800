//! Classifier implementations and the persisted classifier enum.
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::ModelInput;

pub mod classifier_trait;
pub mod factory;
pub mod gbdt;

pub use classifier_trait::ClassifierModel;
pub use gbdt::GbdtClassifier;

/// Every classifier kind that can be written to and read from an artifact.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    Gbdt(GbdtClassifier),
}

impl ClassifierModel for Classifier {
    fn fit(&mut self, x: &ModelInput, y: &[i32], weights: Option<&[f32]>) -> Result<()> {
        match self {
            Classifier::Gbdt(m) => m.fit(x, y, weights),
        }
    }

    fn predict_proba(&self, x: &ModelInput) -> Result<Vec<f64>> {
        match self {
            Classifier::Gbdt(m) => m.predict_proba(x),
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        match self {
            Classifier::Gbdt(m) => m.feature_names(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Classifier::Gbdt(m) => m.name(),
        }
    }
}
