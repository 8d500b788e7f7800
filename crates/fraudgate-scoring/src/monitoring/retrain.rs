use log::info;
use serde::Serialize;

/// Validation AUC below which a model is considered degraded.
pub const MIN_ACCEPTABLE_AUC: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RetrainReason {
    DataDrift,
    PerformanceDrop { auc: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainDecision {
    pub retrain: bool,
    pub reasons: Vec<RetrainReason>,
}

/// Retrain on detected drift or when a measured AUC falls below
/// [`MIN_ACCEPTABLE_AUC`]. `auc` is `None` while labels are unavailable.
pub fn should_retrain(drift_detected: bool, auc: Option<f64>) -> RetrainDecision {
    let mut reasons = Vec::new();
    if drift_detected {
        info!("Retrain triggered due to data drift");
        reasons.push(RetrainReason::DataDrift);
    }
    if let Some(auc) = auc.filter(|&a| a < MIN_ACCEPTABLE_AUC) {
        info!("Retrain triggered due to performance drop (AUC {:.4})", auc);
        reasons.push(RetrainReason::PerformanceDrop { auc });
    }
    if reasons.is_empty() {
        info!("No retraining required");
    }
    RetrainDecision {
        retrain: !reasons.is_empty(),
        reasons,
    }
}
