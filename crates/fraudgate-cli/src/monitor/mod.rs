//! `fraudgate monitor`: drift and performance checks over the prediction log.
use std::path::Path;

use anyhow::Result;

use fraudgate_scoring::io::read_numeric_column;
use fraudgate_scoring::monitoring::{
    check_numeric_drift, check_performance, live_amounts, DriftOutcome, PerformanceStatus,
    PredictionLog,
};
use fraudgate_scoring::record::TRANSACTION_AMT;

/// Compare logged `TransactionAmt` values with the training column.
pub fn drift(log_path: &Path, train_data: &Path, alpha: f64) -> Result<DriftOutcome> {
    let contents = PredictionLog::new(log_path).read()?;
    log::info!("Loaded {} prediction rows", contents.entries.len());

    let train = read_numeric_column(train_data, TRANSACTION_AMT)?;
    let live = live_amounts(&contents.entries);
    let outcome = check_numeric_drift(TRANSACTION_AMT, &train, &live, alpha);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome)
}

pub fn performance(log_path: &Path) -> Result<PerformanceStatus> {
    let contents = PredictionLog::new(log_path).read()?;
    log::info!("Loaded {} prediction records", contents.entries.len());

    let status = check_performance(&contents.entries);
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(status)
}
