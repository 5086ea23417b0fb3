//! Dataset construction from polars frames
//!
//! Converts a typed `DataFrame` into the numeric feature matrix and encoded
//! target the selection and training code works on.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FeatureMatrix, FeatureSet};
use crate::error::{Result, SieveError};

/// Numeric targets with at most this many distinct integral values are
/// treated as class labels when the problem type is inferred.
const MAX_INFERRED_CLASSES: usize = 10;

/// Tolerance for deciding that a float is integral
const TOLERANCE: f64 = 1e-9;

/// Kind of supervised problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemType::Classification => write!(f, "classification"),
            ProblemType::Regression => write!(f, "regression"),
        }
    }
}

impl std::str::FromStr for ProblemType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classification" | "clf" => Ok(ProblemType::Classification),
            "regression" | "reg" => Ok(ProblemType::Regression),
            _ => Err(format!(
                "Unknown problem type: '{}'. Use 'classification' or 'regression'.",
                s
            )),
        }
    }
}

/// The designated target column after encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Class ids (`0..k`) for classification, raw values for regression
    pub values: Vec<f64>,
    /// Whether the source column had a numeric dtype
    pub raw_numeric: bool,
    /// Original labels indexed by class id (classification only)
    pub classes: Option<Vec<String>>,
}

impl Target {
    pub fn n_classes(&self) -> usize {
        self.classes.as_ref().map(|c| c.len()).unwrap_or(0)
    }
}

/// A tabular dataset split into features and a target.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: FeatureMatrix,
    target: Target,
    problem_type: ProblemType,
}

impl Dataset {
    /// Build a dataset from a polars frame.
    ///
    /// # Arguments
    /// * `df` - Already imputed frame; any null is rejected
    /// * `target` - Name of the target column
    /// * `problem_type` - Explicit problem type, or `None` to infer it from the target
    pub fn from_frame(
        df: &DataFrame,
        target: &str,
        problem_type: Option<ProblemType>,
    ) -> Result<Self> {
        let target_col = df
            .column(target)
            .map_err(|_| SieveError::config(format!("Target column '{}' not found", target)))?;

        check_nulls(target_col)?;

        let mut names = Vec::new();
        let mut columns = Vec::new();
        for col in df.get_columns() {
            if col.name().as_str() == target {
                continue;
            }
            check_nulls(col)?;
            names.push(col.name().to_string());
            columns.push(column_to_f64(col)?);
        }

        let raw_numeric = target_col.dtype().is_primitive_numeric();
        let raw_values = if raw_numeric {
            TargetValues::Numeric(column_to_f64(target_col)?)
        } else {
            TargetValues::Labels(column_to_strings(target_col)?)
        };

        let features = FeatureMatrix::new(names, columns)?;
        Self::from_target_values(features, target, raw_values, problem_type)
    }

    /// Build a dataset from an already numeric matrix and target vector.
    ///
    /// Classification targets are re-encoded to class ids in ascending value order.
    pub fn from_parts(
        features: FeatureMatrix,
        target_name: &str,
        y: Vec<f64>,
        problem_type: Option<ProblemType>,
    ) -> Result<Self> {
        if y.len() != features.n_rows() {
            return Err(SieveError::data(format!(
                "Target has {} rows but features have {}",
                y.len(),
                features.n_rows()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(SieveError::data(format!(
                "Target column '{}' contains non-finite values",
                target_name
            )));
        }
        Self::from_target_values(features, target_name, TargetValues::Numeric(y), problem_type)
    }

    fn from_target_values(
        features: FeatureMatrix,
        target_name: &str,
        raw: TargetValues,
        problem_type: Option<ProblemType>,
    ) -> Result<Self> {
        if features.n_cols() == 0 {
            return Err(SieveError::data("Dataset has no feature columns"));
        }
        if features.n_rows() == 0 {
            return Err(SieveError::data("Dataset has no rows"));
        }

        let problem_type = problem_type.unwrap_or_else(|| infer_problem_type(&raw));

        let target = match (raw, problem_type) {
            (TargetValues::Labels(_), ProblemType::Regression) => {
                return Err(SieveError::data(format!(
                    "Target column '{}' is not numeric and cannot be used for regression",
                    target_name
                )));
            }
            (TargetValues::Labels(labels), ProblemType::Classification) => {
                let (values, classes) = encode_labels(&labels);
                Target {
                    name: target_name.to_string(),
                    values,
                    raw_numeric: false,
                    classes: Some(classes),
                }
            }
            (TargetValues::Numeric(values), ProblemType::Classification) => {
                let (values, classes) = encode_numeric_classes(&values);
                Target {
                    name: target_name.to_string(),
                    values,
                    raw_numeric: true,
                    classes: Some(classes),
                }
            }
            (TargetValues::Numeric(values), ProblemType::Regression) => Target {
                name: target_name.to_string(),
                values,
                raw_numeric: true,
                classes: None,
            },
        };

        log::debug!(
            "Dataset ready: {} rows, {} features, target '{}' ({})",
            features.n_rows(),
            features.n_cols(),
            target.name,
            problem_type
        );

        Ok(Self {
            features,
            target,
            problem_type,
        })
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn y(&self) -> &[f64] {
        &self.target.values
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub fn n_rows(&self) -> usize {
        self.features.n_rows()
    }

    /// All feature columns, in original column order
    pub fn feature_set(&self) -> FeatureSet {
        self.features.feature_set()
    }
}

enum TargetValues {
    Numeric(Vec<f64>),
    Labels(Vec<String>),
}

fn infer_problem_type(raw: &TargetValues) -> ProblemType {
    match raw {
        TargetValues::Labels(_) => ProblemType::Classification,
        TargetValues::Numeric(values) => {
            let integral = values.iter().all(|v| (v - v.round()).abs() < TOLERANCE);
            let mut distinct: Vec<f64> = values.clone();
            distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            distinct.dedup();
            if integral && distinct.len() <= MAX_INFERRED_CLASSES {
                ProblemType::Classification
            } else {
                ProblemType::Regression
            }
        }
    }
}

/// Encode string labels to class ids in sorted label order
fn encode_labels(labels: &[String]) -> (Vec<f64>, Vec<String>) {
    let mut classes: Vec<String> = labels.to_vec();
    classes.sort();
    classes.dedup();
    let values = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or(0) as f64)
        .collect();
    (values, classes)
}

/// Encode numeric labels to class ids in ascending value order
fn encode_numeric_classes(values: &[f64]) -> (Vec<f64>, Vec<String>) {
    let mut distinct: Vec<f64> = values.to_vec();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup_by(|a, b| (*a - *b).abs() < TOLERANCE);
    let encoded = values
        .iter()
        .map(|v| {
            distinct
                .iter()
                .position(|d| (d - v).abs() < TOLERANCE)
                .unwrap_or(0) as f64
        })
        .collect();
    let classes = distinct.iter().map(|d| format!("{}", d)).collect();
    (encoded, classes)
}

fn check_nulls(col: &Column) -> Result<()> {
    let nulls = col.null_count();
    if nulls == 0 {
        return Ok(());
    }
    if nulls == col.len() {
        return Err(SieveError::data(format!(
            "Column '{}' contains only null values",
            col.name()
        )));
    }
    Err(SieveError::data(format!(
        "Column '{}' has {} missing value(s); impute before selection",
        col.name(),
        nulls
    )))
}

/// Numeric columns are cast; string and boolean columns are label-encoded.
fn column_to_f64(col: &Column) -> Result<Vec<f64>> {
    let polars_err = |e: PolarsError| SieveError::data(format!("Column '{}': {}", col.name(), e));

    if col.dtype().is_primitive_numeric() {
        let cast = col.cast(&DataType::Float64).map_err(polars_err)?;
        let ca = cast.f64().map_err(polars_err)?;
        let values: Vec<f64> = ca.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SieveError::data(format!(
                "Column '{}' contains non-finite values",
                col.name()
            )));
        }
        return Ok(values);
    }

    let labels = column_to_strings(col)?;
    let (codes, _) = encode_labels(&labels);
    Ok(codes)
}

fn column_to_strings(col: &Column) -> Result<Vec<String>> {
    let polars_err = |e: PolarsError| SieveError::data(format!("Column '{}': {}", col.name(), e));

    let values: Vec<String> = match col.dtype() {
        DataType::String => col
            .str()
            .map_err(polars_err)?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect(),
        DataType::Boolean => col
            .bool()
            .map_err(polars_err)?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()).unwrap_or_default())
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String).map_err(polars_err)?;
            cast.str()
                .map_err(polars_err)?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect()
        }
    };
    Ok(values)
}
