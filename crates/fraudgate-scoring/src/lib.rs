//! fraudgate-scoring: feature encoding, schema enforcement and versioned scoring
//! for transaction fraud models.
//!
//! A raw [`record::TransactionRecord`] flows through the same stages at training
//! and serving time:
//!
//! 1. [`features::FeatureEngineer`] derives `TransactionAmt_log`;
//! 2. [`preprocessing::Preprocessor`] frequency-encodes categorical fields, reindexes
//!    to the frozen feature schema and imputes medians;
//! 3. [`contract::ScoringContract`] checks names, count and order against the
//!    persisted schema and casts to the labelled `f32` input the classifier takes;
//! 4. the classifier returns a fraud probability that
//!    [`scoring::DecisionPolicy`] maps to allow / challenge / block.
//!
//! Artifacts for each model version live in a [`artifacts::VersionedArtifactStore`].
//! [`training`] produces new versions and [`monitoring`] watches served traffic.
pub mod artifacts;
pub mod config;
pub mod contract;
pub mod encoding;
pub mod error;
pub mod features;
pub mod frame;
pub mod imputation;
pub mod io;
pub mod models;
pub mod monitoring;
pub mod preprocessing;
pub mod record;
pub mod schema;
pub mod scoring;
pub mod stats;
pub mod training;

pub use error::{Result, ScoringError};
