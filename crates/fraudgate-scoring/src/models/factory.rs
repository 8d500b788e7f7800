use crate::config::{ModelConfig, ModelType};
use crate::models::gbdt::GbdtClassifier;
use crate::models::Classifier;

/// Build an untrained classifier from a `ModelConfig`.
pub fn build_model(params: ModelConfig) -> Classifier {
    match params.model_type {
        ModelType::GBDT { .. } => Classifier::Gbdt(GbdtClassifier::new(params)),
    }
}
