//! Feature scorer catalog
//!
//! Every scorer maps a candidate domain to one score per feature. Auxiliary
//! models fitted while scoring live only for the duration of the call.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::mutual_info::mutual_info_scores;
use crate::data::{Dataset, FeatureMatrix, FeatureSet, ProblemType};
use crate::error::{Result, SieveError};
use crate::estimator::{
    Estimator, GradientBoosting, Lasso, LinearRegression, LogisticRegression, Model, RandomForest,
};

/// Score of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub feature: String,
    pub score: f64,
}

/// One score per feature of the scorer's input domain, in domain order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    entries: Vec<FeatureScore>,
    /// Scores are 1.0 (selected) / 0.0 (eliminated) rather than continuous
    pub binary: bool,
}

impl ScoreTable {
    pub fn new(features: &FeatureSet, scores: Vec<f64>, binary: bool) -> Self {
        let entries = features
            .iter()
            .zip(scores)
            .map(|(feature, score)| FeatureScore {
                feature: feature.clone(),
                score,
            })
            .collect();
        Self { entries, binary }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureScore> {
        self.entries.iter()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.feature == feature)
            .map(|e| e.score)
    }

    /// Features in table order
    pub fn features(&self) -> FeatureSet {
        self.entries.iter().map(|e| e.feature.clone()).collect()
    }
}

/// Base estimator wrapped by recursive feature elimination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfeBase {
    /// Linear regression, or logistic regression for classification
    Linear,
    /// Random forest importances
    Forest,
}

/// Knobs shared by every scorer invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerOptions {
    pub seed: u64,
    /// Equal-frequency bins for mutual information
    pub mi_bins: usize,
    /// Features removed per elimination round
    pub rfe_step: usize,
    /// Trees in the ensembles fitted by importance scorers
    pub n_estimators: usize,
}

impl Default for ScorerOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            mi_bins: 10,
            rfe_step: 1,
            n_estimators: 100,
        }
    }
}

/// The scorer catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerKind {
    MutualInformation,
    /// Absolute Pearson correlation with a numeric target
    Correlation,
    /// Recursive feature elimination down to `n_features`; `None` defers the
    /// count to the stage's TopN policy (or half the domain)
    Rfe {
        n_features: Option<usize>,
        base: RfeBase,
    },
    /// Lasso coefficient magnitudes; zero-coefficient features are dropped
    L1 { alpha: f64 },
    /// Random forest impurity importances
    TreeImportance,
    /// Gradient boosting gain importances
    BoostedImportance,
}

impl ScorerKind {
    /// Whether features scoring exactly zero are removed regardless of policy
    pub fn drops_zero_scores(&self) -> bool {
        matches!(self, ScorerKind::L1 { .. })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ScorerKind::Rfe { .. })
    }

    /// Score every feature in `domain` against the dataset's target.
    ///
    /// # Arguments
    /// * `dataset` - Source of the feature columns, target and problem type
    /// * `domain` - Candidate features; every name must exist in the dataset
    /// * `options` - Seed and per-scorer settings
    pub fn score(&self, dataset: &Dataset, domain: &FeatureSet, options: &ScorerOptions) -> Result<ScoreTable> {
        if domain.is_empty() {
            return Err(SieveError::empty(format!("{} scorer input", self)));
        }
        let x = dataset.features().select(domain)?;
        let y = dataset.y();
        let problem = dataset.problem_type();
        debug!("Scoring {} features with {}", domain.len(), self);

        let scores = match self {
            ScorerKind::MutualInformation => mutual_info_scores(&x, y, problem, options.mi_bins),
            ScorerKind::Correlation => {
                if !dataset.target().raw_numeric {
                    return Err(SieveError::data(format!(
                        "Correlation scoring needs a numeric target, but '{}' is categorical",
                        dataset.target().name
                    )));
                }
                correlation_scores(&x, y)
            }
            ScorerKind::Rfe { n_features, base } => {
                let keep = n_features.unwrap_or_else(|| (domain.len() / 2).max(1));
                recursive_elimination(&x, y, problem, *base, keep, options)?
            }
            ScorerKind::L1 { alpha } => {
                let mut model = Model::Lasso(Lasso::with_alpha(*alpha));
                model.fit(&x, y, problem)?;
                model
                    .coefficient_magnitudes()
                    .ok_or_else(|| SieveError::fit("Lasso produced no coefficients"))?
            }
            ScorerKind::TreeImportance => {
                let mut model = Model::RandomForest(
                    RandomForest::new(options.seed).with_estimators(options.n_estimators),
                );
                model.fit(&x, y, problem)?;
                importances(&model)?
            }
            ScorerKind::BoostedImportance => {
                let mut model = Model::GradientBoosting(
                    GradientBoosting::new(options.seed).with_estimators(options.n_estimators),
                );
                model.fit(&x, y, problem)?;
                importances(&model)?
            }
        };

        Ok(ScoreTable::new(domain, scores, self.is_binary()))
    }
}

fn importances(model: &Model) -> Result<Vec<f64>> {
    model
        .feature_importances()
        .ok_or_else(|| SieveError::fit(format!("{} produced no importances", model.name())))
}

/// Absolute Pearson correlation of each column with `y`, computed with
/// Welford's single-pass update. Constant columns score 0.
fn correlation_scores(x: &FeatureMatrix, y: &[f64]) -> Vec<f64> {
    x.columns()
        .par_iter()
        .map(|col| pearson_correlation(col, y).map_or(0.0, f64::abs))
        .collect()
}

/// Pearson correlation, or `None` when either side has zero variance.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len();
    if n == 0 || n != b.len() {
        return None;
    }

    let mut count = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        count += 1.0;
        let dx = x - mean_x;
        let dy = y - mean_y;
        mean_x += dx / count;
        mean_y += dy / count;
        var_x += dx * (x - mean_x);
        var_y += dy * (y - mean_y);
        cov_xy += dx * (y - mean_y);
    }

    if var_x <= 1e-12 || var_y <= 1e-12 {
        return None;
    }
    Some(cov_xy / (var_x.sqrt() * var_y.sqrt()))
}

/// Recursive feature elimination.
///
/// Fits the base estimator, removes the `step` weakest features (lowest
/// |coefficient| or importance; ties remove the later column), and repeats
/// until `keep` remain. Returns 1.0 for kept features, 0.0 otherwise.
fn recursive_elimination(
    x: &FeatureMatrix,
    y: &[f64],
    problem: ProblemType,
    base: RfeBase,
    keep: usize,
    options: &ScorerOptions,
) -> Result<Vec<f64>> {
    let n_cols = x.n_cols();
    if n_cols < 2 {
        return Err(SieveError::config(
            "Recursive feature elimination needs at least 2 candidate features",
        ));
    }
    if keep == 0 || keep > n_cols {
        return Err(SieveError::config(format!(
            "Recursive feature elimination cannot keep {} of {} features",
            keep, n_cols
        )));
    }

    let step = options.rfe_step.max(1);
    let mut remaining: Vec<usize> = (0..n_cols).collect();

    while remaining.len() > keep {
        let names: FeatureSet = remaining.iter().map(|&j| x.names()[j].clone()).collect();
        let subset = x.select(&names)?;

        let mut model = match (base, problem) {
            (RfeBase::Linear, ProblemType::Regression) => {
                Model::LinearRegression(LinearRegression::default())
            }
            (RfeBase::Linear, ProblemType::Classification) => {
                Model::LogisticRegression(LogisticRegression::default())
            }
            (RfeBase::Forest, _) => Model::RandomForest(
                RandomForest::new(options.seed).with_estimators(options.n_estimators),
            ),
        };
        model.fit(&subset, y, problem)?;
        let weights = model
            .feature_weights()
            .ok_or_else(|| SieveError::fit(format!("{} exposes no feature weights", model.name())))?;

        // Weakest first; among equals the later column goes first
        let mut order: Vec<usize> = (0..remaining.len()).collect();
        order.sort_by(|&a, &b| weights[a].total_cmp(&weights[b]).then(b.cmp(&a)));

        let n_drop = step.min(remaining.len() - keep);
        let mut dropped: Vec<usize> = order[..n_drop].to_vec();
        dropped.sort_unstable_by(|a, b| b.cmp(a));
        for position in dropped {
            debug!("RFE drops '{}'", x.names()[remaining[position]]);
            remaining.remove(position);
        }
    }

    let mut scores = vec![0.0; n_cols];
    for j in remaining {
        scores[j] = 1.0;
    }
    Ok(scores)
}

impl std::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScorerKind::MutualInformation => write!(f, "mutual_information"),
            ScorerKind::Correlation => write!(f, "correlation"),
            ScorerKind::Rfe { base: RfeBase::Linear, .. } => write!(f, "rfe"),
            ScorerKind::Rfe { base: RfeBase::Forest, .. } => write!(f, "rfe_forest"),
            ScorerKind::L1 { .. } => write!(f, "l1"),
            ScorerKind::TreeImportance => write!(f, "tree_importance"),
            ScorerKind::BoostedImportance => write!(f, "boosted_importance"),
        }
    }
}

impl std::str::FromStr for ScorerKind {
    type Err = String;

    /// Accepts `mi`, `corr`, `rfe`, `rfe_forest`, `l1[@alpha]`, `forest`, `boosting`
    /// and their long names.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, arg) = match lower.split_once('@') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lower.as_str(), None),
        };
        let kind = match name {
            "mi" | "mutual_info" | "mutual_information" => ScorerKind::MutualInformation,
            "corr" | "correlation" => ScorerKind::Correlation,
            "rfe" => ScorerKind::Rfe {
                n_features: None,
                base: RfeBase::Linear,
            },
            "rfe_forest" => ScorerKind::Rfe {
                n_features: None,
                base: RfeBase::Forest,
            },
            "l1" | "lasso" => {
                let alpha = match arg {
                    Some(a) => a
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid L1 alpha: '{}'", a))?,
                    None => 0.01,
                };
                return Ok(ScorerKind::L1 { alpha });
            }
            "forest" | "tree" | "tree_importance" | "rf" => ScorerKind::TreeImportance,
            "boosting" | "boosted" | "boosted_importance" | "gbm" => ScorerKind::BoostedImportance,
            _ => {
                return Err(format!(
                    "Unknown scorer: '{}'. Use mi, corr, rfe, rfe_forest, l1, forest or boosting.",
                    s
                ))
            }
        };
        if arg.is_some() {
            return Err(format!("Scorer '{}' takes no argument", name));
        }
        Ok(kind)
    }
}
