//! `fraudgate retrain`: decide from monitoring signals, then train if needed.
use anyhow::Result;

use fraudgate_scoring::monitoring::{should_retrain, RetrainDecision};
use fraudgate_scoring::training::{TrainingConfig, TrainingReport};

use crate::train::trainer;

/// The training config is only loaded once a retrain is going ahead, so a
/// skipped retrain does not require the training tables to be present.
pub fn retrain<F>(
    load_config: F,
    drift_detected: bool,
    auc: Option<f64>,
    force: bool,
) -> Result<(RetrainDecision, Option<TrainingReport>)>
where
    F: FnOnce() -> Result<TrainingConfig>,
{
    let decision = should_retrain(drift_detected, auc);
    if !decision.retrain && !force {
        log::info!("No retraining trigger fired");
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok((decision, None));
    }

    if decision.retrain {
        log::info!("Retraining triggered: {:?}", decision.reasons);
    } else {
        log::info!("Retraining forced without a trigger");
    }
    let config = load_config()?;
    let report = trainer::train(&config)?;
    log::info!("Retraining finished: model v{} is ready", report.version);
    Ok((decision, Some(report)))
}
