//! Gradient-boosted regression trees
//!
//! Regression fits each stage to the residuals of squared loss. Classification
//! keeps one additive score per class and fits each stage's trees to the
//! softmax gradient (one-hot target minus current probability).

use serde::{Deserialize, Serialize};

use super::linear::unknown_param;
use super::tree::DecisionTree;
use super::{argmax, check_predict_input, class_count, Estimator, ParamValue};
use crate::data::{FeatureMatrix, ProblemType};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
    /// Initial score per output (mean target or log class prior)
    #[serde(default)]
    init: Vec<f64>,
    /// stages[stage][output]
    #[serde(default)]
    stages: Vec<Vec<DecisionTree>>,
    #[serde(default)]
    problem: Option<ProblemType>,
    #[serde(default)]
    n_features: Option<usize>,
}

impl GradientBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            seed,
            init: Vec::new(),
            stages: Vec::new(),
            problem: None,
            n_features: None,
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    fn stage_tree(&self, stage: usize) -> DecisionTree {
        DecisionTree::new(self.seed.wrapping_add(stage as u64)).with_max_depth(Some(self.max_depth))
    }

    /// Raw additive scores per row and output
    fn raw_scores(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        let mut scores = vec![self.init.clone(); x.n_rows()];
        for stage in &self.stages {
            for (output, tree) in stage.iter().enumerate() {
                for (row, v) in tree.predict(x)?.into_iter().enumerate() {
                    scores[row][output] += self.learning_rate * v;
                }
            }
        }
        Ok(scores)
    }
}

fn softmax_in_place(scores: &[f64], out: &mut [f64]) {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for (o, s) in out.iter_mut().zip(scores.iter()) {
        *o = (s - max).exp();
        total += *o;
    }
    out.iter_mut().for_each(|o| *o /= total);
}

impl Estimator for GradientBoosting {
    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }

    fn supports(&self, _problem: ProblemType) -> bool {
        true
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        let n = x.n_rows();
        let rows: Vec<usize> = (0..n).collect();
        self.stages.clear();

        match problem {
            ProblemType::Regression => {
                let mean = y.iter().sum::<f64>() / n as f64;
                self.init = vec![mean];
                let mut current = vec![mean; n];

                for stage in 0..self.n_estimators {
                    let residuals: Vec<f64> = y.iter().zip(current.iter()).map(|(t, c)| t - c).collect();
                    let mut tree = self.stage_tree(stage);
                    tree.fit_rows(x, &residuals, &rows, ProblemType::Regression, 0)?;
                    for (c, v) in current.iter_mut().zip(tree.predict(x)?) {
                        *c += self.learning_rate * v;
                    }
                    self.stages.push(vec![tree]);
                }
            }
            ProblemType::Classification => {
                let k = class_count(y).max(2);
                let labels: Vec<usize> = y.iter().map(|v| v.round() as usize).collect();

                // Step 1: log class priors (smoothed so absent classes stay finite)
                let mut counts = vec![0.0; k];
                for &l in &labels {
                    counts[l] += 1.0;
                }
                self.init = counts
                    .iter()
                    .map(|c| ((c + 1.0) / (n as f64 + k as f64)).ln())
                    .collect();

                let mut scores = vec![self.init.clone(); n];
                let mut probs = vec![0.0; k];

                // Step 2: one regression tree per class per stage on the softmax gradient
                for stage in 0..self.n_estimators {
                    let mut gradients = vec![vec![0.0; n]; k];
                    for i in 0..n {
                        softmax_in_place(&scores[i], &mut probs);
                        for class in 0..k {
                            let target = if labels[i] == class { 1.0 } else { 0.0 };
                            gradients[class][i] = target - probs[class];
                        }
                    }

                    let mut stage_trees = Vec::with_capacity(k);
                    for (class, gradient) in gradients.iter().enumerate() {
                        let mut tree = self.stage_tree(stage);
                        tree.fit_rows(x, gradient, &rows, ProblemType::Regression, 0)?;
                        for (i, v) in tree.predict(x)?.into_iter().enumerate() {
                            scores[i][class] += self.learning_rate * v;
                        }
                        stage_trees.push(tree);
                    }
                    self.stages.push(stage_trees);
                }
            }
        }

        self.problem = Some(problem);
        self.n_features = Some(x.n_cols());
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(self.name(), self.n_features, x)?;
        let scores = self.raw_scores(x)?;
        Ok(match self.problem {
            Some(ProblemType::Classification) => scores.iter().map(|s| argmax(s) as f64).collect(),
            _ => scores.iter().map(|s| s[0]).collect(),
        })
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "n_estimators" => self.n_estimators = value.as_usize(key)?.max(1),
            "learning_rate" => self.learning_rate = value.as_f64(key)?,
            "max_depth" => self.max_depth = value.as_usize(key)?.max(1),
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["n_estimators", "learning_rate", "max_depth"]
    }

    /// Impurity decreases summed over every stage tree, normalised
    fn feature_importances(&self) -> Option<Vec<f64>> {
        let n_features = self.n_features?;
        let mut out = vec![0.0; n_features];
        for tree in self.stages.iter().flatten() {
            if let Some(imp) = tree.feature_importances() {
                for (o, v) in out.iter_mut().zip(imp.iter()) {
                    *o += v;
                }
            }
        }
        let total: f64 = out.iter().sum();
        if total > 0.0 {
            out.iter_mut().for_each(|o| *o /= total);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_fits_step_function() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y: Vec<f64> = xs.iter().map(|v| if *v < 20.0 { 1.0 } else { 5.0 }).collect();
        let x = FeatureMatrix::new(vec!["x".into()], vec![xs]).unwrap();

        let mut model = GradientBoosting::new(0).with_estimators(50);
        model.fit(&x, &y, ProblemType::Regression).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(crate::metrics::r2(&y, &pred) > 0.95);
    }

    #[test]
    fn test_classification_three_classes() {
        let xs: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..30).map(|i| (i / 10) as f64).collect();
        let x = FeatureMatrix::new(vec!["x".into()], vec![xs]).unwrap();

        let mut model = GradientBoosting::new(0).with_estimators(20);
        model.fit(&x, &y, ProblemType::Classification).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let imp = model.feature_importances().unwrap();
        assert!((imp[0] - 1.0).abs() < 1e-12);
    }
}
