//! Offline training pipeline: join, select, engineer, split, fit, publish.
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactSet, VersionedArtifactStore};
use crate::config::ModelConfig;
use crate::contract::ScoringContract;
use crate::features::FeatureEngineer;
use crate::frame::{ColumnValues, Frame};
use crate::io::{left_join, read_table};
use crate::models::factory::build_model;
use crate::models::ClassifierModel;
use crate::preprocessing::Preprocessor;
use crate::record::RAW_FEATURE_FIELDS;
use crate::stats::roc_auc;

/// Parameters for one training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub transactions_path: PathBuf,
    /// Optional identity table, left-joined on `id_column`.
    pub identity_path: Option<PathBuf>,
    pub model_dir: PathBuf,
    pub model: ModelConfig,
    pub id_column: String,
    pub label_column: String,
    pub keep_columns: Vec<String>,
    pub max_missing_fraction: f64,
    pub validation_fraction: f64,
    pub seed: u64,
    /// Point production at the new version once it is saved.
    pub promote: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            transactions_path: PathBuf::from("data/train_transaction.csv"),
            identity_path: Some(PathBuf::from("data/train_identity.csv")),
            model_dir: PathBuf::from("models"),
            model: ModelConfig::default(),
            id_column: "TransactionID".to_string(),
            label_column: "isFraud".to_string(),
            keep_columns: RAW_FEATURE_FIELDS.iter().map(|s| s.to_string()).collect(),
            max_missing_fraction: 0.9,
            validation_fraction: 0.2,
            seed: 42,
            promote: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    pub version: u32,
    pub n_train: usize,
    pub n_validation: usize,
    /// `None` when the validation split is empty.
    pub validation_auc: Option<f64>,
    pub scale_pos_weight: f64,
    pub feature_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub promoted: bool,
}

/// Model-ready training data: engineered features and labels (1 fraud, -1 legitimate).
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub features: Frame,
    pub labels: Vec<i32>,
    pub dropped_columns: Vec<String>,
}

/// Read and join the training tables, then apply column selection and feature
/// engineering.
pub fn load_training_data(config: &TrainingConfig) -> Result<TrainingData> {
    let transactions = read_table(&config.transactions_path).with_context(|| {
        format!(
            "Failed to read transactions: {}",
            config.transactions_path.display()
        )
    })?;
    log::info!(
        "Loaded {} transactions with {} columns",
        transactions.nrows(),
        transactions.ncols()
    );

    let joined = match &config.identity_path {
        Some(path) => {
            let identity = read_table(path)
                .with_context(|| format!("Failed to read identity table: {}", path.display()))?;
            left_join(&transactions, &identity, &config.id_column)?
        }
        None => transactions,
    };

    prepare_training_frame(joined, config)
}

/// Column selection, engineering and label extraction on an already joined frame.
pub fn prepare_training_frame(mut frame: Frame, config: &TrainingConfig) -> Result<TrainingData> {
    let dropped_columns: Vec<String> = frame
        .column_names()
        .into_iter()
        .filter(|name| {
            frame
                .missing_fraction(name)
                .map_or(false, |f| f > config.max_missing_fraction)
        })
        .collect();
    if !dropped_columns.is_empty() {
        log::info!(
            "Dropping {} columns with more than {:.0}% missing values",
            dropped_columns.len(),
            config.max_missing_fraction * 100.0
        );
        log::debug!("Dropped columns: {:?}", dropped_columns);
    }
    frame.drop_columns(&dropped_columns);
    frame.remove_column(&config.id_column);

    let label_column = frame
        .remove_column(&config.label_column)
        .ok_or_else(|| anyhow!("Label column '{}' not found", config.label_column))?;
    let labels = labels_from_column(&label_column.values, &config.label_column)?;

    let mut selected = Frame::empty(frame.nrows());
    for name in &config.keep_columns {
        match frame.remove_column(name) {
            Some(column) => selected.set_column(column)?,
            None => log::warn!("Configured column '{}' not present; skipping", name),
        }
    }
    if selected.ncols() == 0 {
        bail!("None of the configured feature columns are present in the training data");
    }

    let features = FeatureEngineer::new().engineer_frame(&selected);
    Ok(TrainingData {
        features,
        labels,
        dropped_columns,
    })
}

fn labels_from_column(values: &ColumnValues, name: &str) -> Result<Vec<i32>> {
    let ColumnValues::Numeric(values) = values else {
        bail!("Label column '{}' must be numeric 0/1", name);
    };
    values
        .iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if *v == 1.0 => Ok(1),
            Some(v) if *v == 0.0 => Ok(-1),
            Some(v) => Err(anyhow!("Invalid label {} at row {}", v, row + 1)),
            None => Err(anyhow!("Missing label at row {}", row + 1)),
        })
        .collect()
}

/// Stratified train/validation split. Each class contributes
/// `round(n_class * validation_fraction)` rows to validation, keeping at least one
/// row of every class in train. Returned indices are sorted.
pub fn stratified_split(
    labels: &[i32],
    validation_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&validation_fraction) {
        bail!(
            "validation_fraction must be in [0, 1), got {}",
            validation_fraction
        );
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    for class in [1, -1] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            bail!(
                "Training data has no {} rows",
                if class == 1 { "fraud" } else { "legitimate" }
            );
        }
        members.shuffle(&mut rng);
        let n_val = ((members.len() as f64 * validation_fraction).round() as usize)
            .min(members.len() - 1);
        validation.extend_from_slice(&members[..n_val]);
        train.extend_from_slice(&members[n_val..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    Ok((train, validation))
}

/// Weight applied to fraud rows: `n_legitimate / n_fraud`.
pub fn scale_pos_weight(labels: &[i32]) -> f64 {
    let pos = labels.iter().filter(|&&l| l == 1).count();
    let neg = labels.len() - pos;
    if pos == 0 {
        1.0
    } else {
        neg as f64 / pos as f64
    }
}

/// Run the full pipeline and publish the result as the next model version.
pub fn run_training(config: &TrainingConfig) -> Result<TrainingReport> {
    let data = load_training_data(config)?;
    train_and_publish(data, config)
}

/// Fit on prepared data and publish. Split out so callers holding data in memory
/// can skip the CSV step.
pub fn train_and_publish(data: TrainingData, config: &TrainingConfig) -> Result<TrainingReport> {
    let TrainingData {
        features,
        labels,
        dropped_columns,
    } = data;

    let (train_idx, val_idx) =
        stratified_split(&labels, config.validation_fraction, config.seed)?;
    let train_frame = features.select_rows(&train_idx);
    let val_frame = features.select_rows(&val_idx);
    let y_train: Vec<i32> = train_idx.iter().map(|&i| labels[i]).collect();
    let y_val: Vec<i32> = val_idx.iter().map(|&i| labels[i]).collect();
    log::info!(
        "Split {} rows into {} train / {} validation",
        labels.len(),
        train_idx.len(),
        val_idx.len()
    );

    let mut preprocessor = Preprocessor::new();
    let x_train = preprocessor
        .fit_transform(&train_frame)
        .context("Failed to fit preprocessor")?;
    let expected = preprocessor.feature_columns()?.clone();
    log::info!("Feature columns: {:?}", expected.columns());

    let contract = ScoringContract::new(expected.clone(), &expected, None)?;
    let train_input = contract.validate(&x_train)?;

    let pos_weight = scale_pos_weight(&y_train);
    log::debug!("scale_pos_weight = {:.4}", pos_weight);
    let weights: Vec<f32> = y_train
        .iter()
        .map(|&l| if l == 1 { pos_weight as f32 } else { 1.0 })
        .collect();

    let mut classifier = build_model(config.model.clone());
    log::info!("Training {} classifier", classifier.name());
    classifier
        .fit(&train_input, &y_train, Some(&weights))
        .context("Failed to fit classifier")?;

    // every schema record must agree before anything is written
    ScoringContract::new(
        expected.clone(),
        preprocessor.feature_columns()?,
        classifier.feature_names(),
    )?;

    let validation_auc = if val_idx.is_empty() {
        log::warn!("Validation split is empty; skipping AUC");
        None
    } else {
        let x_val = preprocessor.transform(&val_frame)?;
        let val_input = contract.validate(&x_val)?;
        let probabilities = classifier.predict_proba(&val_input)?;
        let auc = roc_auc(&probabilities, &y_val);
        log::info!("Validation AUC: {:.4}", auc);
        Some(auc)
    };

    let store = VersionedArtifactStore::create(&config.model_dir)
        .with_context(|| format!("Failed to open model dir: {}", config.model_dir.display()))?;
    let version = store.next_version()?;
    let feature_columns = expected.columns().to_vec();
    store.save(
        version,
        &ArtifactSet {
            classifier,
            preprocessor,
            expected_features: expected,
        },
    )?;

    let promoted = if config.promote {
        store.promote(version)?;
        true
    } else {
        store.production_version()? == version
    };
    log::info!(
        "Model v{} saved{}",
        version,
        if promoted { " and marked as production" } else { "" }
    );

    Ok(TrainingReport {
        version,
        n_train: train_idx.len(),
        n_validation: val_idx.len(),
        validation_auc,
        scale_pos_weight: pos_weight,
        feature_columns,
        dropped_columns,
        promoted,
    })
}
