use crate::error::Result;
use crate::frame::ModelInput;

/// Contract between the scoring pipeline and a binary fraud classifier.
///
/// Classifiers always receive labelled input ([`ModelInput`]); implementations
/// that record their training feature names must reject input labelled
/// differently instead of predicting on a bare vector.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model. `y` uses the crate convention (1 for fraud, -1 for legitimate).
    /// `weights` are per-row sample weights; `None` weighs every row equally.
    fn fit(&mut self, x: &ModelInput, y: &[i32], weights: Option<&[f32]>) -> Result<()>;

    /// Fraud probabilities in [0, 1], one per row.
    fn predict_proba(&self, x: &ModelInput) -> Result<Vec<f64>>;

    /// Feature names recorded at fit time, when the model keeps them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
