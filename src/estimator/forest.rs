//! Random forest: bootstrap-aggregated CART trees grown in parallel

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::linear::unknown_param;
use super::tree::DecisionTree;
use super::{argmax, check_predict_input, class_count, Estimator, ParamValue};
use crate::data::{FeatureMatrix, ProblemType};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    /// Features per split; defaults to √p for classification and p/3 for regression
    pub max_features: Option<usize>,
    pub seed: u64,
    #[serde(default)]
    trees: Vec<DecisionTree>,
    #[serde(default)]
    problem: Option<ProblemType>,
    #[serde(default)]
    n_features: Option<usize>,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            seed,
            trees: Vec::new(),
            problem: None,
            n_features: None,
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    fn default_max_features(problem: ProblemType, n_cols: usize) -> usize {
        let m = match problem {
            ProblemType::Classification => (n_cols as f64).sqrt().round() as usize,
            ProblemType::Regression => n_cols / 3,
        };
        m.clamp(1, n_cols)
    }
}

impl Estimator for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn supports(&self, _problem: ProblemType) -> bool {
        true
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        let n = x.n_rows();
        let n_classes = match problem {
            ProblemType::Classification => class_count(y).max(2),
            ProblemType::Regression => 0,
        };
        let max_features = self
            .max_features
            .unwrap_or_else(|| Self::default_max_features(problem, x.n_cols()));

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators.max(1))
            .into_par_iter()
            .map(|i| {
                let tree_seed = self.seed.wrapping_add(i as u64);
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

                let mut tree = DecisionTree::new(tree_seed).with_max_depth(self.max_depth);
                tree.min_samples_leaf = self.min_samples_leaf;
                tree.max_features = Some(max_features);
                tree.fit_rows(x, y, &sample, problem, n_classes)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.problem = Some(problem);
        self.n_features = Some(x.n_cols());
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(self.name(), self.n_features, x)?;
        let n_trees = self.trees.len() as f64;

        match self.problem {
            Some(ProblemType::Classification) => {
                let mut summed: Vec<Vec<f64>> = Vec::new();
                for tree in &self.trees {
                    let proba = tree.predict_proba(x)?;
                    if summed.is_empty() {
                        summed = proba;
                    } else {
                        for (acc, p) in summed.iter_mut().zip(proba.iter()) {
                            for (a, v) in acc.iter_mut().zip(p.iter()) {
                                *a += v;
                            }
                        }
                    }
                }
                Ok(summed.iter().map(|p| argmax(p) as f64).collect())
            }
            _ => {
                let mut summed = vec![0.0; x.n_rows()];
                for tree in &self.trees {
                    for (acc, v) in summed.iter_mut().zip(tree.predict(x)?) {
                        *acc += v;
                    }
                }
                Ok(summed.into_iter().map(|s| s / n_trees).collect())
            }
        }
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "n_estimators" => self.n_estimators = value.as_usize(key)?.max(1),
            "max_depth" => self.max_depth = value.as_opt_usize(key)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(key)?.max(1),
            "max_features" => self.max_features = value.as_opt_usize(key)?,
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["n_estimators", "max_depth", "min_samples_leaf", "max_features"]
    }

    /// Mean of per-tree normalised importances
    fn feature_importances(&self) -> Option<Vec<f64>> {
        let n_features = self.n_features?;
        let mut out = vec![0.0; n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (o, v) in out.iter_mut().zip(imp.iter()) {
                    *o += v;
                }
            }
        }
        let n = self.trees.len().max(1) as f64;
        Some(out.into_iter().map(|v| v / n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (FeatureMatrix, Vec<f64>) {
        let signal: Vec<f64> = (0..60).map(|i| if i < 30 { i as f64 * 0.1 } else { 10.0 + i as f64 * 0.1 }).collect();
        let noise: Vec<f64> = (0..60).map(|i| ((i * 17) % 13) as f64).collect();
        let y: Vec<f64> = (0..60).map(|i| if i < 30 { 0.0 } else { 1.0 }).collect();
        (
            FeatureMatrix::new(vec!["signal".into(), "noise".into()], vec![signal, noise]).unwrap(),
            y,
        )
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(7).with_estimators(10);
        let mut b = RandomForest::new(7).with_estimators(10);
        a.fit(&x, &y, ProblemType::Classification).unwrap();
        b.fit(&x, &y, ProblemType::Classification).unwrap();
        assert_eq!(a.feature_importances(), b.feature_importances());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_forest_prefers_signal() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(3).with_estimators(20);
        forest.fit(&x, &y, ProblemType::Classification).unwrap();
        let imp = forest.feature_importances().unwrap();
        assert!(imp[0] > imp[1], "importances {:?}", imp);
        let pred = forest.predict(&x).unwrap();
        assert!(crate::metrics::accuracy(&y, &pred) >= 0.95);
    }

    #[test]
    fn test_default_max_features() {
        assert_eq!(RandomForest::default_max_features(ProblemType::Classification, 16), 4);
        assert_eq!(RandomForest::default_max_features(ProblemType::Regression, 2), 1);
    }
}
