use std::fmt;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::error::{Result, ScoringError};
use crate::frame::ModelInput;
use crate::models::classifier_trait::ClassifierModel;
use crate::schema::SchemaDiff;

/// Gradient Boosting Decision Tree (GBDT) classifier
#[derive(Serialize, Deserialize)]
pub struct GbdtClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
    feature_names: Vec<String>,
}

impl GbdtClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GbdtClassifier {
            model: None,
            params,
            feature_names: Vec::new(),
        }
    }

    pub fn params(&self) -> &ModelConfig {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn build_config(&self, feature_size: usize) -> Config {
        let ModelType::GBDT {
            max_depth,
            num_boost_round,
            debug,
            training_optimization_level,
            loss_type,
        } = &self.params.model_type;

        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(*max_depth);
        config.set_iterations(*num_boost_round as usize);
        config.set_debug(*debug);
        config.set_training_optimization_level(*training_optimization_level);
        config.set_loss(loss_type);
        config
    }
}

impl fmt::Debug for GbdtClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbdtClassifier")
            .field("fitted", &self.is_fitted())
            .field("params", &self.params)
            .field("feature_names", &self.feature_names)
            .finish()
    }
}

impl ClassifierModel for GbdtClassifier {
    fn fit(&mut self, x: &ModelInput, y: &[i32], weights: Option<&[f32]>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(ScoringError::Precondition(
                "cannot fit classifier on zero rows".to_string(),
            ));
        }
        if y.len() != x.nrows() {
            return Err(ScoringError::Precondition(format!(
                "{} labels for {} rows",
                y.len(),
                x.nrows()
            )));
        }
        if let Some(label) = y.iter().find(|&&l| l != 1 && l != -1) {
            return Err(ScoringError::Precondition(format!(
                "labels must be 1 (fraud) or -1 (legitimate), found {}",
                label
            )));
        }
        if let Some(w) = weights {
            if w.len() != x.nrows() {
                return Err(ScoringError::Precondition(format!(
                    "{} sample weights for {} rows",
                    w.len(),
                    x.nrows()
                )));
            }
        }

        let config = self.build_config(x.ncols());
        let mut gbdt = GBDT::new(&config);

        let mut train_x = DataVec::with_capacity(x.nrows());
        for (i, &label) in y.iter().enumerate() {
            let weight = weights.map_or(1.0, |w| w[i]);
            train_x.push(Data::new_training_data(
                x.row_vec(i),
                weight,
                label as f32,
                None,
            ));
        }

        debug!(
            "Fitting GBDT on {} rows x {} features",
            x.nrows(),
            x.ncols()
        );
        gbdt.fit(&mut train_x);

        self.feature_names = x.feature_names().to_vec();
        self.model = Some(gbdt);
        Ok(())
    }

    fn predict_proba(&self, x: &ModelInput) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or_else(|| {
            ScoringError::Precondition("classifier must be fitted before predicting".to_string())
        })?;

        let diff = SchemaDiff::between(&self.feature_names, x.feature_names());
        if !diff.is_empty() {
            return Err(diff.into_error("classifier input"));
        }

        let mut test_x = DataVec::with_capacity(x.nrows());
        for row in 0..x.nrows() {
            test_x.push(Data::new_test_data(x.row_vec(row), None));
        }
        let predictions = model.predict(&test_x);
        trace!("raw GBDT predictions: {:?}", predictions);

        predictions
            .into_iter()
            .enumerate()
            .map(|(row, p)| {
                let p = f64::from(p);
                if p.is_finite() {
                    Ok(p.clamp(0.0, 1.0))
                } else {
                    Err(ScoringError::TypeCoercion {
                        column: "fraud_probability".to_string(),
                        row: Some(row),
                        detail: format!("classifier returned non-finite score {}", p),
                    })
                }
            })
            .collect()
    }

    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn separable() -> (ModelInput, Vec<i32>) {
        // feature 0 separates the classes, feature 1 is noise
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let fraud = i % 2 == 0;
            data.push(if fraud { 5.0 + (i as f32) * 0.01 } else { -5.0 });
            data.push((i % 7) as f32);
            y.push(if fraud { 1 } else { -1 });
        }
        let x = ModelInput::new(
            vec!["signal".to_string(), "noise".to_string()],
            Array2::from_shape_vec((40, 2), data).unwrap(),
        )
        .unwrap();
        (x, y)
    }

    fn small_params() -> ModelConfig {
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

    #[test]
    fn test_gbdt_classifier() {
        let (x, y) = separable();
        let mut classifier = GbdtClassifier::new(small_params());
        classifier.fit(&x, &y, None).unwrap();

        let probs = classifier.predict_proba(&x).unwrap();
        assert_eq!(probs.len(), y.len());
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        // fraud rows should score above legitimate ones
        assert!(probs[0] > probs[1]);
        assert_eq!(classifier.feature_names().unwrap(), x.feature_names());
    }

    #[test]
    fn rejects_relabelled_input() {
        let (x, y) = separable();
        let mut classifier = GbdtClassifier::new(small_params());
        classifier.fit(&x, &y, None).unwrap();

        let renamed = ModelInput::new(
            vec!["signal".to_string(), "noise2".to_string()],
            x.values().clone(),
        )
        .unwrap();
        let err = classifier.predict_proba(&renamed).unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn predict_before_fit_is_precondition() {
        let (x, _) = separable();
        let classifier = GbdtClassifier::new(small_params());
        assert!(matches!(
            classifier.predict_proba(&x),
            Err(ScoringError::Precondition(_))
        ));
    }

    #[test]
    fn fit_rejects_bad_labels() {
        let (x, mut y) = separable();
        y[0] = 0;
        let mut classifier = GbdtClassifier::new(small_params());
        assert!(classifier.fit(&x, &y, None).is_err());
    }
}
