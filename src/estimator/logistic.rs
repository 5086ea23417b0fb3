//! Multinomial logistic regression fitted by batch gradient descent

use serde::{Deserialize, Serialize};

use super::linear::unknown_param;
use super::{argmax, check_predict_input, class_count, standardization, Estimator, ParamValue};
use crate::data::{class_counts, FeatureMatrix, ProblemType};
use crate::error::{Result, SieveError};

/// Softmax regression on standardised inputs with an L2 penalty of `1 / (n·C)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
    #[serde(default)]
    means: Vec<f64>,
    #[serde(default)]
    scales: Vec<f64>,
    /// weights[class][feature]
    #[serde(default)]
    weights: Vec<Vec<f64>>,
    #[serde(default)]
    bias: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 300,
            learning_rate: 0.5,
            tol: 1e-6,
            means: Vec::new(),
            scales: Vec::new(),
            weights: Vec::new(),
            bias: Vec::new(),
        }
    }
}

impl LogisticRegression {
    fn logits(&self, row: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.bias.iter())
            .map(|(w, b)| b + w.iter().zip(row.iter()).map(|(wi, xi)| wi * xi).sum::<f64>())
            .collect()
    }

    fn standardized_rows(&self, x: &FeatureMatrix) -> Vec<Vec<f64>> {
        (0..x.n_rows())
            .map(|i| {
                (0..x.n_cols())
                    .map(|j| (x.get(i, j) - self.means[j]) / self.scales[j])
                    .collect()
            })
            .collect()
    }

    /// Class probabilities per row
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        check_predict_input(self.name(), self.fitted_features(), x)?;
        Ok(self
            .standardized_rows(x)
            .iter()
            .map(|row| softmax(&self.logits(row)))
            .collect())
    }

    fn fitted_features(&self) -> Option<usize> {
        self.weights.first().map(|w| w.len())
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn supports(&self, problem: ProblemType) -> bool {
        problem == ProblemType::Classification
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], _problem: ProblemType) -> Result<()> {
        if class_counts(y).len() < 2 {
            return Err(SieveError::fit(
                "Logistic regression needs at least two classes in the training rows",
            ));
        }
        let n_classes = class_count(y).max(2);
        let n_features = x.n_cols();
        let n = x.n_rows() as f64;
        let (means, scales) = standardization(x);
        self.means = means;
        self.scales = scales;
        self.weights = vec![vec![0.0; n_features]; n_classes];
        self.bias = vec![0.0; n_classes];

        let rows = self.standardized_rows(x);
        let labels: Vec<usize> = y.iter().map(|v| v.round() as usize).collect();
        let penalty = 1.0 / (self.c * n);

        for _ in 0..self.max_iter {
            let mut grad_w = vec![vec![0.0; n_features]; n_classes];
            let mut grad_b = vec![0.0; n_classes];

            for (row, &label) in rows.iter().zip(labels.iter()) {
                let probs = softmax(&self.logits(row));
                for class in 0..n_classes {
                    let err = probs[class] - if class == label { 1.0 } else { 0.0 };
                    grad_b[class] += err;
                    for (g, xi) in grad_w[class].iter_mut().zip(row.iter()) {
                        *g += err * xi;
                    }
                }
            }

            let mut max_step = 0.0f64;
            let mut finite = true;
            for class in 0..n_classes {
                let step_b = self.learning_rate * grad_b[class] / n;
                self.bias[class] -= step_b;
                finite &= step_b.is_finite();
                max_step = max_step.max(step_b.abs());
                for j in 0..n_features {
                    let g = grad_w[class][j] / n + penalty * self.weights[class][j];
                    let step = self.learning_rate * g;
                    self.weights[class][j] -= step;
                    finite &= step.is_finite();
                    max_step = max_step.max(step.abs());
                }
            }
            if !finite {
                return Err(SieveError::fit("Logistic regression diverged"));
            }
            if max_step < self.tol {
                break;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|p| argmax(p) as f64)
            .collect())
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "c" => {
                let c = value.as_f64(key)?;
                if c <= 0.0 {
                    return Err(SieveError::config("Logistic regression C must be positive"));
                }
                self.c = c;
            }
            "max_iter" => self.max_iter = value.as_usize(key)?,
            "learning_rate" => self.learning_rate = value.as_f64(key)?,
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["c", "max_iter", "learning_rate"]
    }

    fn coefficient_magnitudes(&self) -> Option<Vec<f64>> {
        let n_features = self.fitted_features()?;
        let mut out = vec![0.0; n_features];
        for w in &self.weights {
            for (o, c) in out.iter_mut().zip(w.iter()) {
                *o += c.abs();
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separable_three_classes() {
        let a: Vec<f64> = (0..30).map(|i| (i / 10) as f64 * 5.0 + (i % 10) as f64 * 0.1).collect();
        let b: Vec<f64> = (0..30).map(|i| ((i * 3) % 7) as f64).collect();
        let y: Vec<f64> = (0..30).map(|i| (i / 10) as f64).collect();
        let x = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap();

        let mut model = LogisticRegression::default();
        model.fit(&x, &y, ProblemType::Classification).unwrap();
        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 24, "only {} correct", correct);

        let mags = model.coefficient_magnitudes().unwrap();
        assert!(mags[0] > mags[1]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![0.0, 1.0, 2.0, 3.0]]).unwrap();
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y, ProblemType::Classification).unwrap();
        for p in model.predict_proba(&x).unwrap() {
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let mut model = LogisticRegression::default();
        assert!(model.set_param("c", &ParamValue::Float(0.0)).is_err());
    }

    #[test]
    fn test_single_class_is_fit_error() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let err = LogisticRegression::default()
            .fit(&x, &[1.0, 1.0, 1.0], ProblemType::Classification)
            .unwrap_err();
        assert!(matches!(err, SieveError::Fit(_)));
    }

    #[test]
    fn test_infinite_learning_rate_diverges() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![0.0, 1.0, 2.0, 3.0]]).unwrap();
        let mut model = LogisticRegression {
            learning_rate: f64::INFINITY,
            ..LogisticRegression::default()
        };
        let err = model
            .fit(&x, &[0.0, 0.0, 0.0, 1.0], ProblemType::Classification)
            .unwrap_err();
        assert!(err.to_string().contains("diverged"));
    }
}
