//! Evaluation metrics for classification and regression
//!
//! Classification metrics take class ids (as `f64`), compare them after
//! rounding, and weight per-class scores by class support.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::ProblemType;
use crate::error::{Result, SieveError};

/// Metric used to score folds and grid points.
///
/// Error metrics are negated so that greater is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    Accuracy,
    F1Weighted,
    PrecisionWeighted,
    RecallWeighted,
    R2,
    NegMeanSquaredError,
    NegRootMeanSquaredError,
    NegMeanAbsoluteError,
}

impl ScoringMetric {
    /// Default metric for a problem type
    pub fn default_for(problem: ProblemType) -> Self {
        match problem {
            ProblemType::Classification => ScoringMetric::F1Weighted,
            ProblemType::Regression => ScoringMetric::R2,
        }
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            ScoringMetric::Accuracy
            | ScoringMetric::F1Weighted
            | ScoringMetric::PrecisionWeighted
            | ScoringMetric::RecallWeighted => ProblemType::Classification,
            _ => ProblemType::Regression,
        }
    }

    /// Key of the matching entry in a metrics map
    pub fn key(&self) -> &'static str {
        match self {
            ScoringMetric::Accuracy => "accuracy",
            ScoringMetric::F1Weighted => "f1_weighted",
            ScoringMetric::PrecisionWeighted => "precision_weighted",
            ScoringMetric::RecallWeighted => "recall_weighted",
            ScoringMetric::R2 => "r2",
            ScoringMetric::NegMeanSquaredError => "mse",
            ScoringMetric::NegRootMeanSquaredError => "rmse",
            ScoringMetric::NegMeanAbsoluteError => "mae",
        }
    }

    /// Score predictions, oriented so that greater is better.
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        check_lengths(y_true, y_pred)?;
        let value = match self {
            ScoringMetric::Accuracy => accuracy(y_true, y_pred),
            ScoringMetric::F1Weighted => weighted_scores(y_true, y_pred).f1,
            ScoringMetric::PrecisionWeighted => weighted_scores(y_true, y_pred).precision,
            ScoringMetric::RecallWeighted => weighted_scores(y_true, y_pred).recall,
            ScoringMetric::R2 => r2(y_true, y_pred),
            ScoringMetric::NegMeanSquaredError => -mse(y_true, y_pred),
            ScoringMetric::NegRootMeanSquaredError => -mse(y_true, y_pred).sqrt(),
            ScoringMetric::NegMeanAbsoluteError => -mae(y_true, y_pred),
        };
        Ok(value)
    }
}

impl std::fmt::Display for ScoringMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringMetric::NegMeanSquaredError => write!(f, "neg_mse"),
            ScoringMetric::NegRootMeanSquaredError => write!(f, "neg_rmse"),
            ScoringMetric::NegMeanAbsoluteError => write!(f, "neg_mae"),
            other => write!(f, "{}", other.key()),
        }
    }
}

impl std::str::FromStr for ScoringMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accuracy" => Ok(ScoringMetric::Accuracy),
            "f1" | "f1_weighted" => Ok(ScoringMetric::F1Weighted),
            "precision" | "precision_weighted" => Ok(ScoringMetric::PrecisionWeighted),
            "recall" | "recall_weighted" => Ok(ScoringMetric::RecallWeighted),
            "r2" => Ok(ScoringMetric::R2),
            "mse" | "neg_mse" => Ok(ScoringMetric::NegMeanSquaredError),
            "rmse" | "neg_rmse" => Ok(ScoringMetric::NegRootMeanSquaredError),
            "mae" | "neg_mae" => Ok(ScoringMetric::NegMeanAbsoluteError),
            _ => Err(format!("Unknown scoring metric: '{}'", s)),
        }
    }
}

/// Support-weighted precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Full metric dictionary for a problem type, as stored on trained results.
pub fn evaluate(problem: ProblemType, y_true: &[f64], y_pred: &[f64]) -> Result<BTreeMap<String, f64>> {
    check_lengths(y_true, y_pred)?;
    let mut metrics = BTreeMap::new();
    match problem {
        ProblemType::Classification => {
            let w = weighted_scores(y_true, y_pred);
            metrics.insert("accuracy".to_string(), accuracy(y_true, y_pred));
            metrics.insert("precision_weighted".to_string(), w.precision);
            metrics.insert("recall_weighted".to_string(), w.recall);
            metrics.insert("f1_weighted".to_string(), w.f1);
        }
        ProblemType::Regression => {
            let mse = mse(y_true, y_pred);
            metrics.insert("r2".to_string(), r2(y_true, y_pred));
            metrics.insert("mse".to_string(), mse);
            metrics.insert("rmse".to_string(), mse.sqrt());
            metrics.insert("mae".to_string(), mae(y_true, y_pred));
        }
    }
    Ok(metrics)
}

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(SieveError::data(format!(
            "Prediction length {} does not match target length {}",
            y_pred.len(),
            y_true.len()
        )));
    }
    if y_true.is_empty() {
        return Err(SieveError::data("Cannot score an empty prediction set"));
    }
    Ok(())
}

pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t.round() == p.round())
        .count();
    correct as f64 / y_true.len() as f64
}

/// Per-class scores weighted by true-class support; classes with no
/// predictions score 0 precision.
pub fn weighted_scores(y_true: &[f64], y_pred: &[f64]) -> WeightedScores {
    let mut classes: Vec<i64> = y_true.iter().map(|v| v.round() as i64).collect();
    classes.sort_unstable();
    classes.dedup();

    let n = y_true.len() as f64;
    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;

    for &class in &classes {
        let mut tp = 0.0;
        let mut fp = 0.0;
        let mut fn_ = 0.0;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let t = t.round() as i64;
            let p = p.round() as i64;
            if p == class && t == class {
                tp += 1.0;
            } else if p == class {
                fp += 1.0;
            } else if t == class {
                fn_ += 1.0;
            }
        }
        let support = tp + fn_;
        let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let r = if support > 0.0 { tp / support } else { 0.0 };
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        let weight = support / n;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    WeightedScores {
        precision,
        recall,
        f1,
    }
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination; a constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}
