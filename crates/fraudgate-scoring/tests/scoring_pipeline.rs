//! Train a small model in memory, publish it, and exercise the serving path.

use std::path::Path;

use fraudgate_scoring::artifacts::VersionedArtifactStore;
use fraudgate_scoring::config::{ModelConfig, ModelType};
use fraudgate_scoring::features::FeatureEngineer;
use fraudgate_scoring::frame::Frame;
use fraudgate_scoring::record::{FieldValue, TransactionRecord};
use fraudgate_scoring::schema::FeatureSchema;
use fraudgate_scoring::scoring::{Decision, DecisionPolicy, ScoringContext};
use fraudgate_scoring::training::{train_and_publish, TrainingConfig, TrainingData};
use fraudgate_scoring::ScoringError;
use serde_json::json;

fn small_model() -> ModelConfig {
    ModelConfig::new(
        0.1,
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 20,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        },
    )
}

/// 200 transactions; every fifth one is fraud with a large amount and product "C".
fn synthetic_data() -> TrainingData {
    let mut records = Vec::new();
    let mut labels = Vec::new();
    for i in 0..200u32 {
        let fraud = i % 5 == 0;
        let amount = if fraud {
            400.0 + f64::from(i % 37) * 10.0
        } else {
            10.0 + f64::from(i % 53) * 1.5
        };
        let product = if fraud { "C" } else if i % 3 == 0 { "H" } else { "W" };
        let card4 = ["visa", "mastercard", "discover"][(i % 3) as usize];
        let mut record = TransactionRecord::new()
            .with("TransactionAmt", FieldValue::Number(amount))
            .with("ProductCD", FieldValue::Text(product.to_string()))
            .with("card1", FieldValue::Number(f64::from(1000 + i * 7 % 500)))
            .with("card4", FieldValue::Text(card4.to_string()));
        if i % 4 == 0 {
            record.insert("DeviceType", FieldValue::Missing);
        } else {
            let device = if i % 2 == 0 { "mobile" } else { "desktop" };
            record.insert("DeviceType", FieldValue::Text(device.to_string()));
        }
        records.push(record);
        labels.push(if fraud { 1 } else { -1 });
    }
    TrainingData {
        features: FeatureEngineer::new().engineer_frame(&Frame::from_records(&records)),
        labels,
        dropped_columns: Vec::new(),
    }
}

fn config(model_dir: &Path, promote: bool) -> TrainingConfig {
    TrainingConfig {
        model_dir: model_dir.to_path_buf(),
        model: small_model(),
        promote,
        ..TrainingConfig::default()
    }
}

#[test]
fn end_to_end_scoring_of_a_live_request() {
    let dir = tempfile::tempdir().unwrap();
    let report = train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    assert_eq!(report.version, 1);
    assert!(report.promoted);
    assert_eq!(report.n_train + report.n_validation, 200);
    assert_eq!(report.scale_pos_weight, 4.0);
    assert!(report.validation_auc.unwrap() > 0.9);

    let store = VersionedArtifactStore::new(dir.path());
    let ctx = ScoringContext::load(&store).unwrap();
    assert_eq!(ctx.version(), 1);
    assert_eq!(ctx.contract().expected().columns(), report.feature_columns.as_slice());

    let prediction = ctx
        .score_value(&json!({"TransactionAmt": 59.0, "ProductCD": "W", "card4": "visa"}))
        .unwrap();
    assert!((0.0..=1.0).contains(&prediction.fraud_probability));
    assert_eq!(
        prediction.decision,
        ctx.policy().decide(prediction.fraud_probability)
    );
    assert_eq!(ctx.policy(), &DecisionPolicy::default());
    assert_eq!(prediction.model_version, 1);

    let risky = ctx
        .score_value(&json!({"TransactionAmt": 700.0, "ProductCD": "C", "card4": "visa"}))
        .unwrap();
    assert!(risky.fraud_probability > prediction.fraud_probability);
    assert_eq!(risky.decision, Decision::Block);
}

#[test]
fn invalid_requests_fail_instead_of_defaulting() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let ctx = ScoringContext::load(&VersionedArtifactStore::new(dir.path())).unwrap();

    assert!(matches!(
        ctx.score_value(&json!([59.0, "W"])),
        Err(ScoringError::InvalidRecord(_))
    ));
    assert!(matches!(
        ctx.score_value(&json!({"TransactionAmt": true})),
        Err(ScoringError::InvalidRecord(_))
    ));
    assert!(matches!(
        ctx.score_value(&json!({"TransactionAmt": "fifty"})),
        Err(ScoringError::TypeCoercion { .. })
    ));
    // quoted numbers are text too, at every stage
    assert!(matches!(
        ctx.score_value(&json!({"TransactionAmt": "59.0"})),
        Err(ScoringError::TypeCoercion { .. })
    ));

    // absent optional fields and a null amount are still scored
    let sparse = ctx.score_value(&json!({"TransactionAmt": null})).unwrap();
    assert!((0.0..=1.0).contains(&sparse.fraud_probability));
}

#[test]
fn batch_scoring_matches_single_scoring() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let ctx = ScoringContext::load(&VersionedArtifactStore::new(dir.path())).unwrap();

    let records: Vec<TransactionRecord> = [12.0, 59.0, 450.0, 800.0]
        .iter()
        .map(|&amt| {
            TransactionRecord::new()
                .with("TransactionAmt", FieldValue::Number(amt))
                .with("ProductCD", FieldValue::Text("W".to_string()))
        })
        .collect();
    let batch = ctx.score_batch(&records);
    assert_eq!(batch.len(), records.len());
    for (record, result) in records.iter().zip(batch) {
        assert_eq!(result.unwrap(), ctx.score(record).unwrap());
    }
}

#[test]
fn renamed_column_is_rejected_by_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let store = VersionedArtifactStore::new(dir.path());
    let ctx = ScoringContext::load(&store).unwrap();
    let artifacts = store.load(1).unwrap();

    let record = TransactionRecord::new()
        .with("TransactionAmt", FieldValue::Number(59.0))
        .with("card4", FieldValue::Text("visa".to_string()));
    let frame = Frame::from_records(&[FeatureEngineer::new().engineer_record(&record)]);
    let mut matrix = artifacts.preprocessor.transform(&frame).unwrap();
    assert!(matrix.rename_column("card4_freq", "card4_frequency"));

    match ctx.contract().validate(&matrix) {
        Err(ScoringError::SchemaMismatch { missing, extra, .. }) => {
            assert_eq!(missing, vec!["card4_freq".to_string()]);
            assert_eq!(extra, vec!["card4_frequency".to_string()]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn disagreeing_artifacts_fail_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let store = VersionedArtifactStore::new(dir.path());

    let mut artifacts = store.load(1).unwrap();
    let mut reversed = artifacts.expected_features.columns().to_vec();
    reversed.reverse();
    artifacts.expected_features = FeatureSchema::new(reversed);
    let err = ScoringContext::from_artifacts(1, artifacts).unwrap_err();
    assert!(err.is_schema_mismatch());

    let mut artifacts = store.load(1).unwrap();
    let mut shorter = artifacts.expected_features.columns().to_vec();
    let dropped = shorter.pop().unwrap();
    artifacts.expected_features = FeatureSchema::new(shorter);
    match ScoringContext::from_artifacts(1, artifacts) {
        Err(ScoringError::SchemaMismatch { extra, .. }) => assert_eq!(extra, vec![dropped]),
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn versions_are_immutable_and_promotion_moves_the_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let first = train_and_publish(synthetic_data(), &config(dir.path(), false)).unwrap();
    // the first version in an empty store is production regardless
    assert!(first.promoted);

    let second = train_and_publish(synthetic_data(), &config(dir.path(), false)).unwrap();
    assert_eq!(second.version, 2);
    assert!(!second.promoted);

    let store = VersionedArtifactStore::new(dir.path());
    assert_eq!(store.versions().unwrap(), vec![1, 2]);
    assert_eq!(store.latest_version().unwrap(), Some(2));
    assert_eq!(store.production_version().unwrap(), 1);
    assert_eq!(store.next_version().unwrap(), 3);
    assert_eq!(ScoringContext::load(&store).unwrap().version(), 1);

    let classifier_before = std::fs::read(store.classifier_path(1)).unwrap();
    let artifacts = store.load(1).unwrap();
    assert!(matches!(
        store.save(1, &artifacts),
        Err(ScoringError::ArtifactExists { version: 1 })
    ));
    assert_eq!(std::fs::read(store.classifier_path(1)).unwrap(), classifier_before);

    let metadata = store.promote(2).unwrap();
    assert_eq!(metadata.production_version, 2);
    assert_eq!(metadata.latest_version, 2);
    assert_eq!(ScoringContext::load(&store).unwrap().version(), 2);
    assert_eq!(std::fs::read(store.classifier_path(1)).unwrap(), classifier_before);

    assert!(matches!(
        store.promote(7),
        Err(ScoringError::ArtifactMissing { .. })
    ));
    assert_eq!(store.production_version().unwrap(), 2);
}

#[test]
fn missing_artifacts_are_fatal_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let store = VersionedArtifactStore::new(dir.path());
    assert!(matches!(
        ScoringContext::load(&store),
        Err(ScoringError::ArtifactMissing { artifact: "metadata", .. })
    ));

    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    std::fs::remove_file(store.preprocessor_path(1)).unwrap();
    match ScoringContext::load(&store) {
        Err(ScoringError::ArtifactMissing { artifact, path, .. }) => {
            assert_eq!(artifact, "preprocessor");
            assert_eq!(path, store.preprocessor_path(1));
        }
        other => panic!("expected ArtifactMissing, got {:?}", other),
    }

    std::fs::write(store.preprocessor_path(1), b"{not json").unwrap();
    assert!(matches!(
        ScoringContext::load(&store),
        Err(ScoringError::ArtifactMissing { artifact: "preprocessor", .. })
    ));
}

#[test]
fn leftovers_of_a_failed_save_do_not_block_retraining() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let store = VersionedArtifactStore::new(dir.path());

    // a save of v2 that died after its first file
    std::fs::write(store.feature_list_path(2), b"[]").unwrap();
    assert_eq!(store.next_version().unwrap(), 3);

    let retry = train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    assert_eq!(retry.version, 3);
    assert_eq!(store.versions().unwrap(), vec![1, 3]);
    assert_eq!(ScoringContext::load(&store).unwrap().version(), 3);
}

#[test]
fn failed_save_leaves_no_partial_version() {
    let dir = tempfile::tempdir().unwrap();
    train_and_publish(synthetic_data(), &config(dir.path(), true)).unwrap();
    let store = VersionedArtifactStore::new(dir.path());
    let artifacts = store.load(1).unwrap();

    // the classifier's staging file cannot be created
    let blocker = dir.path().join(".classifier_v2.json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    assert!(matches!(store.save(2, &artifacts), Err(ScoringError::Io(_))));

    assert!(!store.feature_list_path(2).exists());
    assert!(!store.preprocessor_path(2).exists());
    assert!(!store.classifier_path(2).exists());
    assert!(!dir.path().join(".feature_columns_v2.json.tmp").exists());
    assert!(!dir.path().join(".preprocessor_v2.json.tmp").exists());
    assert_eq!(store.latest_version().unwrap(), Some(1));

    std::fs::remove_dir(&blocker).unwrap();
    store.save(2, &artifacts).unwrap();
    assert_eq!(store.versions().unwrap(), vec![1, 2]);
}
