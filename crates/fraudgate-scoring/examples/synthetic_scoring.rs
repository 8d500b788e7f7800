use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use fraudgate_scoring::artifacts::VersionedArtifactStore;
use fraudgate_scoring::config::{ModelConfig, ModelType};
use fraudgate_scoring::features::FeatureEngineer;
use fraudgate_scoring::frame::Frame;
use fraudgate_scoring::record::{FieldValue, TransactionRecord};
use fraudgate_scoring::scoring::ScoringContext;
use fraudgate_scoring::training::{train_and_publish, TrainingConfig, TrainingData};

/// Draw `n` transactions where roughly one in ten is fraud with a large amount.
fn synthetic_transactions(n: usize, rng: &mut StdRng) -> (Vec<TransactionRecord>, Vec<i32>) {
    let products = ["W", "H", "R", "S"];
    let cards = ["visa", "mastercard", "discover", "american express"];
    let mut records = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let fraud = rng.gen_bool(0.1);
        let amount = if fraud {
            rng.gen_range(250.0..2000.0)
        } else {
            rng.gen_range(5.0..300.0)
        };
        let product = if fraud && rng.gen_bool(0.7) {
            "C"
        } else {
            products[rng.gen_range(0..products.len())]
        };
        let mut record = TransactionRecord::new()
            .with("TransactionAmt", FieldValue::Number(amount))
            .with("ProductCD", FieldValue::Text(product.to_string()))
            .with("card1", FieldValue::Number(f64::from(rng.gen_range(1000u32..18000))))
            .with(
                "card4",
                FieldValue::Text(cards[rng.gen_range(0..cards.len())].to_string()),
            );
        if rng.gen_bool(0.5) {
            let device = if rng.gen_bool(0.5) { "mobile" } else { "desktop" };
            record.insert("DeviceType", FieldValue::Text(device.to_string()));
        }
        records.push(record);
        labels.push(if fraud { 1 } else { -1 });
    }
    (records, labels)
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(7);
    let (records, labels) = synthetic_transactions(2000, &mut rng);
    println!("Generated {} transactions", records.len());

    let model_dir = std::env::temp_dir().join("fraudgate_synthetic_models");
    if model_dir.exists() {
        std::fs::remove_dir_all(&model_dir)?;
    }

    let config = TrainingConfig {
        model_dir: model_dir.clone(),
        model: ModelConfig::new(
            0.1,
            ModelType::GBDT {
                max_depth: 4,
                num_boost_round: 50,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        ),
        ..TrainingConfig::default()
    };
    let data = TrainingData {
        features: FeatureEngineer::new().engineer_frame(&Frame::from_records(&records)),
        labels,
        dropped_columns: Vec::new(),
    };
    let report = train_and_publish(data, &config)?;
    println!("Trained model: {}", serde_json::to_string_pretty(&report)?);

    let ctx = ScoringContext::load(&VersionedArtifactStore::new(&model_dir))?;
    for request in [
        json!({"TransactionAmt": 59.0, "ProductCD": "W", "card4": "visa"}),
        json!({"TransactionAmt": 1450.0, "ProductCD": "C", "card4": "discover"}),
        json!({"TransactionAmt": null}),
    ] {
        let prediction = ctx.score_value(&request)?;
        println!("{} -> {}", request, serde_json::to_string(&prediction)?);
    }
    Ok(())
}
