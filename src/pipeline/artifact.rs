//! Serialisable fitted model plus the features it was trained on

use serde::{Deserialize, Serialize};

use crate::data::{FeatureMatrix, FeatureSet, ProblemType};
use crate::error::{Result, SieveError};
use crate::estimator::{Estimator, Model};

/// Hand-off for batch or single-record prediction outside the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: Model,
    /// Input columns, in the order the model saw them
    pub features: FeatureSet,
    pub problem_type: ProblemType,
    /// Original target labels by class id (empty for regression)
    pub class_labels: Vec<String>,
}

impl ModelArtifact {
    /// Predict on a matrix holding at least the training features.
    ///
    /// Extra columns are ignored; column order does not matter.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let missing: Vec<&String> = self.features.iter().filter(|f| x.index_of(f).is_none()).collect();
        if !missing.is_empty() {
            return Err(SieveError::data(format!(
                "Input is missing trained features: {}",
                missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }
        self.model.predict(&x.select(&self.features)?)
    }

    /// Predictions mapped back to the original class labels.
    pub fn predict_labels(&self, x: &FeatureMatrix) -> Result<Vec<String>> {
        let predictions = self.predict(x)?;
        if self.problem_type == ProblemType::Regression {
            return Ok(predictions.iter().map(|v| v.to_string()).collect());
        }
        Ok(predictions
            .iter()
            .map(|&v| {
                self.class_labels
                    .get(v.round() as usize)
                    .cloned()
                    .unwrap_or_else(|| v.to_string())
            })
            .collect())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SieveError::data(format!("Failed to serialise model artifact: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SieveError::data(format!("Failed to read model artifact: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::ModelKind;

    fn fitted() -> ModelArtifact {
        let x = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0], vec![0.0; 6]],
        )
        .unwrap();
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = ModelKind::DecisionTree.build(0);
        model.fit(&x, &y, ProblemType::Classification).unwrap();
        ModelArtifact {
            model,
            features: FeatureSet::new(["a", "b"]),
            problem_type: ProblemType::Classification,
            class_labels: vec!["no".into(), "yes".into()],
        }
    }

    #[test]
    fn test_predict_reorders_columns() {
        let artifact = fitted();
        let x = FeatureMatrix::new(
            vec!["extra".into(), "b".into(), "a".into()],
            vec![vec![9.0, 9.0], vec![0.0, 0.0], vec![1.5, 11.5]],
        )
        .unwrap();
        assert_eq!(artifact.predict_labels(&x).unwrap(), vec!["no", "yes"]);
    }

    #[test]
    fn test_missing_feature_rejected() {
        let artifact = fitted();
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0]]).unwrap();
        let err = artifact.predict(&x).unwrap_err();
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn test_json_keeps_predictions() {
        let artifact = fitted();
        let restored = ModelArtifact::from_json(&artifact.to_json().unwrap()).unwrap();
        let x = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![2.0, 10.5], vec![0.0, 0.0]],
        )
        .unwrap();
        assert_eq!(restored.predict(&x).unwrap(), artifact.predict(&x).unwrap());
        assert_eq!(restored.features, artifact.features);
    }
}
