//! Estimator catalog
//!
//! Concrete learners sit behind the [`Estimator`] trait; the closed [`Model`]
//! enum makes a fitted learner serialisable, and [`ModelKind`] is the catalog
//! the trainer, the scorers and grid search build from.

pub mod boosting;
pub mod forest;
pub mod knn;
pub mod linear;
pub mod logistic;
pub mod params;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::data::{FeatureMatrix, ProblemType};
use crate::error::{Result, SieveError};

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use knn::{nearest_neighbors, KNearestNeighbors};
pub use linear::{Lasso, LinearRegression};
pub use logistic::LogisticRegression;
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use tree::DecisionTree;

/// Shared capability of every learner.
pub trait Estimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the learner can be fitted for this problem type
    fn supports(&self, problem: ProblemType) -> bool;

    /// Fit on `x` / `y`. Classification targets are class ids `0..k`.
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()>;

    /// Predict class ids or regression values, one per row of `x`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Set one hyperparameter by name.
    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()>;

    /// Names accepted by [`Estimator::set_param`]
    fn supported_params(&self) -> &'static [&'static str];

    /// Impurity/gain importances, one per fitted feature (tree learners)
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Absolute coefficient magnitudes on standardised inputs (linear learners)
    fn coefficient_magnitudes(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Any catalog learner, fitted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    LinearRegression(LinearRegression),
    Lasso(Lasso),
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    KNearestNeighbors(KNearestNeighbors),
}

impl Model {
    fn inner(&self) -> &dyn Estimator {
        match self {
            Model::LinearRegression(m) => m,
            Model::Lasso(m) => m,
            Model::LogisticRegression(m) => m,
            Model::DecisionTree(m) => m,
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::KNearestNeighbors(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Estimator {
        match self {
            Model::LinearRegression(m) => m,
            Model::Lasso(m) => m,
            Model::LogisticRegression(m) => m,
            Model::DecisionTree(m) => m,
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::KNearestNeighbors(m) => m,
        }
    }

    /// Apply every parameter of a grid point, in order.
    pub fn with_params(mut self, params: &ParamSet) -> Result<Self> {
        for (key, value) in params.iter() {
            self.set_param(key, value)?;
        }
        Ok(self)
    }

    /// Importance-like score per feature: impurity importances for trees,
    /// coefficient magnitudes for linear learners.
    pub fn feature_weights(&self) -> Option<Vec<f64>> {
        self.feature_importances()
            .or_else(|| self.coefficient_magnitudes())
    }
}

impl Estimator for Model {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn supports(&self, problem: ProblemType) -> bool {
        self.inner().supports(problem)
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        if !self.supports(problem) {
            return Err(SieveError::config(format!(
                "{} does not support {}",
                self.name(),
                problem
            )));
        }
        check_fit_input(x, y)?;
        self.inner_mut().fit(x, y, problem)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.inner().predict(x)
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        self.inner_mut().set_param(key, value)
    }

    fn supported_params(&self) -> &'static [&'static str] {
        self.inner().supported_params()
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.inner().feature_importances()
    }

    fn coefficient_magnitudes(&self) -> Option<Vec<f64>> {
        self.inner().coefficient_magnitudes()
    }
}

/// Catalog of learners the trainer can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    Lasso,
    LogisticRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    KNearestNeighbors,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::LinearRegression,
        ModelKind::Lasso,
        ModelKind::LogisticRegression,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::KNearestNeighbors,
    ];

    /// Display name, also used as the registry model name
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::Lasso => "Lasso",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::KNearestNeighbors => "K-Nearest Neighbors",
        }
    }

    pub fn supports(&self, problem: ProblemType) -> bool {
        match self {
            ModelKind::LinearRegression => problem == ProblemType::Regression,
            ModelKind::LogisticRegression => problem == ProblemType::Classification,
            _ => true,
        }
    }

    /// Fresh, unfitted learner with default hyperparameters
    pub fn build(&self, seed: u64) -> Model {
        match self {
            ModelKind::LinearRegression => Model::LinearRegression(LinearRegression::default()),
            ModelKind::Lasso => Model::Lasso(Lasso::default()),
            ModelKind::LogisticRegression => {
                Model::LogisticRegression(LogisticRegression::default())
            }
            ModelKind::DecisionTree => Model::DecisionTree(DecisionTree::new(seed)),
            ModelKind::RandomForest => Model::RandomForest(RandomForest::new(seed)),
            ModelKind::GradientBoosting => Model::GradientBoosting(GradientBoosting::new(seed)),
            ModelKind::KNearestNeighbors => {
                Model::KNearestNeighbors(KNearestNeighbors::default())
            }
        }
    }

    /// Default search space for grid search
    pub fn default_grid(&self) -> ParamGrid {
        use ParamValue::{Float, Int, Text};
        match self {
            ModelKind::LinearRegression => {
                ParamGrid::new().axis("l2", vec![Float(0.0), Float(0.1), Float(1.0)])
            }
            ModelKind::Lasso => ParamGrid::new().axis(
                "alpha",
                vec![Float(0.001), Float(0.01), Float(0.1), Float(1.0)],
            ),
            ModelKind::LogisticRegression => {
                ParamGrid::new().axis("c", vec![Float(0.1), Float(1.0), Float(10.0)])
            }
            ModelKind::DecisionTree => ParamGrid::new()
                .axis(
                    "max_depth",
                    vec![Int(3), Int(5), Int(10), Text("none".into())],
                )
                .axis("min_samples_leaf", vec![Int(1), Int(5)]),
            ModelKind::RandomForest => ParamGrid::new()
                .axis("n_estimators", vec![Int(50), Int(100)])
                .axis("max_depth", vec![Int(5), Text("none".into())]),
            ModelKind::GradientBoosting => ParamGrid::new()
                .axis("n_estimators", vec![Int(50), Int(100)])
                .axis("learning_rate", vec![Float(0.05), Float(0.1)])
                .axis("max_depth", vec![Int(2), Int(3)]),
            ModelKind::KNearestNeighbors => {
                ParamGrid::new().axis("n_neighbors", vec![Int(3), Int(5), Int(7)])
            }
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "linear" | "linear_regression" | "ols" => Ok(ModelKind::LinearRegression),
            "lasso" | "l1" => Ok(ModelKind::Lasso),
            "logistic" | "logistic_regression" | "logreg" => Ok(ModelKind::LogisticRegression),
            "tree" | "decision_tree" | "cart" => Ok(ModelKind::DecisionTree),
            "forest" | "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "boosting" | "gradient_boosting" | "gbm" => Ok(ModelKind::GradientBoosting),
            "knn" | "k_nearest_neighbors" => Ok(ModelKind::KNearestNeighbors),
            _ => Err(format!(
                "Unknown model: '{}'. Use linear, lasso, logistic, tree, forest, boosting or knn.",
                s
            )),
        }
    }
}

/// Validate shapes shared by every `fit` implementation.
pub(crate) fn check_fit_input(x: &FeatureMatrix, y: &[f64]) -> Result<()> {
    if x.n_rows() == 0 {
        return Err(SieveError::fit("Cannot fit on zero rows"));
    }
    if x.n_cols() == 0 {
        return Err(SieveError::fit("Cannot fit on zero features"));
    }
    if x.n_rows() != y.len() {
        return Err(SieveError::fit(format!(
            "Feature rows ({}) and target length ({}) differ",
            x.n_rows(),
            y.len()
        )));
    }
    Ok(())
}

/// Number of classes implied by class ids `0..k`
pub(crate) fn class_count(y: &[f64]) -> usize {
    y.iter().map(|v| v.round() as usize).max().map(|m| m + 1).unwrap_or(0)
}

/// Index of the largest value; ties go to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Fail prediction on an unfitted learner or a feature-count mismatch.
pub(crate) fn check_predict_input(name: &str, fitted_features: Option<usize>, x: &FeatureMatrix) -> Result<()> {
    match fitted_features {
        None => Err(SieveError::fit(format!("{} has not been fitted", name))),
        Some(n) if n != x.n_cols() => Err(SieveError::config(format!(
            "{} was fitted on {} features but got {}",
            name,
            n,
            x.n_cols()
        ))),
        Some(_) => Ok(()),
    }
}

/// Per-column mean and standard deviation; zero-variance columns get scale 1.
pub(crate) fn standardization(x: &FeatureMatrix) -> (Vec<f64>, Vec<f64>) {
    let n = x.n_rows() as f64;
    x.columns()
        .iter()
        .map(|col| {
            let mean = col.iter().sum::<f64>() / n;
            let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > 1e-12 { std } else { 1.0 })
        })
        .unzip()
}
