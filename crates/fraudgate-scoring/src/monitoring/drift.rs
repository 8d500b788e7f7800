//! Distribution drift between training data and live traffic.
use log::{info, warn};
use serde::Serialize;

use crate::monitoring::prediction_log::PredictionLogEntry;
use crate::stats::ks_two_sample;

/// Live samples needed before a drift test is meaningful.
pub const MIN_DRIFT_SAMPLES: usize = 20;
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub feature: String,
    pub statistic: f64,
    pub p_value: f64,
    pub alpha: f64,
    pub train_samples: usize,
    pub live_samples: usize,
    pub drift_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriftOutcome {
    InsufficientData { live_samples: usize, required: usize },
    Checked(DriftReport),
}

impl DriftOutcome {
    pub fn drift_detected(&self) -> bool {
        matches!(self, DriftOutcome::Checked(r) if r.drift_detected)
    }
}

/// Two-sample KS test on one numeric feature. Drift is flagged when the p-value
/// falls below `alpha`.
pub fn check_numeric_drift(feature: &str, train: &[f64], live: &[f64], alpha: f64) -> DriftOutcome {
    let live_samples = live.iter().filter(|v| v.is_finite()).count();
    if live_samples < MIN_DRIFT_SAMPLES {
        warn!(
            "Not enough live data for drift detection on {} ({} < {})",
            feature, live_samples, MIN_DRIFT_SAMPLES
        );
        return DriftOutcome::InsufficientData {
            live_samples,
            required: MIN_DRIFT_SAMPLES,
        };
    }
    let Some(test) = ks_two_sample(train, live) else {
        warn!("No finite training values for {}; cannot test drift", feature);
        return DriftOutcome::InsufficientData {
            live_samples,
            required: MIN_DRIFT_SAMPLES,
        };
    };

    let drift_detected = test.p_value < alpha;
    info!(
        "{} drift check: KS statistic {:.4}, p-value {:.6}{}",
        feature,
        test.statistic,
        test.p_value,
        if drift_detected { " -- DRIFT DETECTED" } else { "" }
    );
    DriftOutcome::Checked(DriftReport {
        feature: feature.to_string(),
        statistic: test.statistic,
        p_value: test.p_value,
        alpha,
        train_samples: train.iter().filter(|v| v.is_finite()).count(),
        live_samples,
        drift_detected,
    })
}

/// Logged transaction amounts, skipping entries without a numeric amount.
pub fn live_amounts(entries: &[PredictionLogEntry]) -> Vec<f64> {
    entries
        .iter()
        .filter_map(PredictionLogEntry::transaction_amount)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_live_samples() {
        let train: Vec<f64> = (0..100).map(f64::from).collect();
        let outcome = check_numeric_drift("TransactionAmt", &train, &[1.0; 19], DEFAULT_ALPHA);
        assert_eq!(
            outcome,
            DriftOutcome::InsufficientData {
                live_samples: 19,
                required: 20
            }
        );
        assert!(!outcome.drift_detected());
    }

    #[test]
    fn shifted_amounts_are_drift() {
        let train: Vec<f64> = (0..200).map(|i| f64::from(i) * 0.5).collect();
        let same: Vec<f64> = (0..50).map(|i| f64::from(i) * 2.0).collect();
        let shifted: Vec<f64> = (0..50).map(|i| 500.0 + f64::from(i)).collect();

        assert!(!check_numeric_drift("TransactionAmt", &train, &same, DEFAULT_ALPHA).drift_detected());
        match check_numeric_drift("TransactionAmt", &train, &shifted, DEFAULT_ALPHA) {
            DriftOutcome::Checked(report) => {
                assert!(report.drift_detected);
                assert_eq!(report.statistic, 1.0);
                assert_eq!(report.live_samples, 50);
            }
            other => panic!("expected a drift report, got {:?}", other),
        }
    }
}
