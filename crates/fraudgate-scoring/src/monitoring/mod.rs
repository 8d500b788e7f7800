//! Post-deployment monitoring: the prediction log, drift and performance checks,
//! and the retraining decision built on them.
pub mod drift;
pub mod performance;
pub mod prediction_log;
pub mod retrain;

pub use drift::{check_numeric_drift, live_amounts, DriftOutcome, DriftReport};
pub use performance::{check_performance, PerformanceStatus};
pub use prediction_log::{PredictionLog, PredictionLogEntry};
pub use retrain::{should_retrain, RetrainDecision, RetrainReason};
