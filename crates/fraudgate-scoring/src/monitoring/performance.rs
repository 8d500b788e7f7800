use serde::Serialize;

use crate::monitoring::prediction_log::PredictionLogEntry;
use crate::scoring::Decision;

/// Logged predictions needed before performance monitoring runs.
pub const MIN_PERFORMANCE_SAMPLES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionCounts {
    pub allow: usize,
    pub challenge: usize,
    pub block: usize,
}

/// Performance status of a label-free deployment. Fraud labels arrive late, so
/// with enough volume the check can only report the score distribution and wait.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PerformanceStatus {
    InsufficientData {
        logged: usize,
        required: usize,
    },
    AwaitingLabels {
        logged: usize,
        decisions: DecisionCounts,
        mean_probability: f64,
    },
}

pub fn check_performance(entries: &[PredictionLogEntry]) -> PerformanceStatus {
    if entries.len() < MIN_PERFORMANCE_SAMPLES {
        log::info!("Performance monitoring skipped: {} logged predictions", entries.len());
        return PerformanceStatus::InsufficientData {
            logged: entries.len(),
            required: MIN_PERFORMANCE_SAMPLES,
        };
    }

    let mut decisions = DecisionCounts::default();
    for entry in entries {
        match entry.decision {
            Decision::Allow => decisions.allow += 1,
            Decision::Challenge => decisions.challenge += 1,
            Decision::Block => decisions.block += 1,
        }
    }
    let mean_probability =
        entries.iter().map(|e| e.fraud_probability).sum::<f64>() / entries.len() as f64;
    log::info!("Waiting for delayed fraud labels to compute metrics");

    PerformanceStatus::AwaitingLabels {
        logged: entries.len(),
        decisions,
        mean_probability,
    }
}
