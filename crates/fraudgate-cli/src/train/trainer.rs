use anyhow::Result;

use fraudgate_scoring::training::{run_training, TrainingConfig, TrainingReport};

/// Train, publish and print the report as JSON.
pub fn train(config: &TrainingConfig) -> Result<TrainingReport> {
    log::info!(
        "Training from {} into {}",
        config.transactions_path.display(),
        config.model_dir.display()
    );
    let report = run_training(config)?;

    match report.validation_auc {
        Some(auc) => log::info!("Model v{} validation AUC: {:.4}", report.version, auc),
        None => log::info!("Model v{} trained without a validation split", report.version),
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}

/// Default configuration rendered as JSON, printed when `train` is run bare.
pub fn config_template() -> Result<String> {
    Ok(serde_json::to_string_pretty(&TrainingConfig::default())?)
}
