//! Request-time scoring against the production model version.
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifacts::{ArtifactSet, VersionedArtifactStore};
use crate::contract::ScoringContract;
use crate::error::{Result, ScoringError};
use crate::features::FeatureEngineer;
use crate::frame::Frame;
use crate::models::{Classifier, ClassifierModel};
use crate::preprocessing::Preprocessor;
use crate::record::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Challenge,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Challenge => "challenge",
            Decision::Block => "block",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Decision::Allow),
            "challenge" => Ok(Decision::Challenge),
            "block" => Ok(Decision::Block),
            _ => Err(format!("Unknown decision: {}", s)),
        }
    }
}

/// Probability thresholds mapping a fraud score to a [`Decision`]. A score equal
/// to a threshold falls in the stricter bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    pub challenge_threshold: f64,
    pub block_threshold: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy {
            challenge_threshold: 0.3,
            block_threshold: 0.6,
        }
    }
}

impl DecisionPolicy {
    pub fn decide(&self, probability: f64) -> Decision {
        if probability < self.challenge_threshold {
            Decision::Allow
        } else if probability < self.block_threshold {
            Decision::Challenge
        } else {
            Decision::Block
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub fraud_probability: f64,
    pub decision: Decision,
    pub model_version: u32,
}

/// Everything needed to score requests for one model version.
///
/// Built once at startup and shared read-only. Scoring never touches the
/// filesystem.
#[derive(Debug)]
pub struct ScoringContext {
    version: u32,
    engineer: FeatureEngineer,
    preprocessor: Preprocessor,
    contract: ScoringContract,
    classifier: Classifier,
    policy: DecisionPolicy,
}

impl ScoringContext {
    /// Load the production version from `store`. Missing or unreadable
    /// artifacts and any schema disagreement between them are fatal.
    pub fn load(store: &VersionedArtifactStore) -> Result<Self> {
        let version = store.production_version()?;
        info!(
            "Loading production model v{} from {}",
            version,
            store.root().display()
        );
        Self::from_artifacts(version, store.load(version)?)
    }

    pub fn from_artifacts(version: u32, artifacts: ArtifactSet) -> Result<Self> {
        let ArtifactSet {
            classifier,
            preprocessor,
            expected_features,
        } = artifacts;

        let contract = ScoringContract::new(
            expected_features,
            preprocessor.feature_columns()?,
            classifier.feature_names(),
        )?;
        debug!(
            "Scoring contract for v{}: {:?}",
            version,
            contract.expected().columns()
        );

        Ok(ScoringContext {
            version,
            engineer: FeatureEngineer::new(),
            preprocessor,
            contract,
            classifier,
            policy: DecisionPolicy::default(),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn contract(&self) -> &ScoringContract {
        &self.contract
    }

    /// Fraud probability for one record.
    pub fn predict_probability(&self, record: &TransactionRecord) -> Result<f64> {
        let engineered = self.engineer.engineer_record(record);
        let frame = Frame::from_records(std::slice::from_ref(&engineered));
        let matrix = self.preprocessor.transform(&frame)?;
        let input = self.contract.validate(&matrix)?;
        let probabilities = self.classifier.predict_proba(&input)?;
        probabilities.first().copied().ok_or_else(|| {
            ScoringError::Precondition("classifier returned no prediction".to_string())
        })
    }

    pub fn score(&self, record: &TransactionRecord) -> Result<Prediction> {
        let fraud_probability = self.predict_probability(record)?;
        let decision = self.policy.decide(fraud_probability);
        debug!(
            "Scored transaction: p={:.6} decision={} model=v{}",
            fraud_probability, decision, self.version
        );
        Ok(Prediction {
            fraud_probability,
            decision,
            model_version: self.version,
        })
    }

    /// Score a JSON object of transaction fields.
    pub fn score_value(&self, value: &Value) -> Result<Prediction> {
        let record = TransactionRecord::from_json(value)?;
        self.score(&record)
    }

    /// Score records in parallel. Each record goes through the same per-record
    /// pipeline as [`score`](Self::score) and fails independently.
    pub fn score_batch(&self, records: &[TransactionRecord]) -> Vec<Result<Prediction>> {
        records.par_iter().map(|r| self.score(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_boundaries() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.decide(0.0), Decision::Allow);
        assert_eq!(policy.decide(0.29), Decision::Allow);
        assert_eq!(policy.decide(0.30), Decision::Challenge);
        assert_eq!(policy.decide(0.59), Decision::Challenge);
        assert_eq!(policy.decide(0.60), Decision::Block);
        assert_eq!(policy.decide(1.0), Decision::Block);
    }

    #[test]
    fn decision_parses_and_prints() {
        for d in [Decision::Allow, Decision::Challenge, Decision::Block] {
            assert_eq!(d.to_string().parse::<Decision>().unwrap(), d);
        }
        assert!("deny".parse::<Decision>().is_err());
        assert_eq!(serde_json::to_string(&Decision::Block).unwrap(), "\"block\"");
    }
}
