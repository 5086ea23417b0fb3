//! Column-major numeric feature matrix

use serde::{Deserialize, Serialize};

use super::FeatureSet;
use crate::error::{Result, SieveError};

/// Dense `f64` matrix with one named column per feature.
///
/// Columns are stored contiguously because scorers work feature by feature;
/// row access is provided for the distance-based and tree-based estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build a matrix from named columns of equal length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(SieveError::config(format!(
                "{} feature names given for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if FeatureSet::new(names.iter().cloned()).len() != names.len() {
            return Err(SieveError::config("Feature names must be unique"));
        }
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_rows) {
            return Err(SieveError::data(format!(
                "Column '{}' has {} rows, expected {}",
                names[i],
                col.len(),
                n_rows
            )));
        }
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Build a matrix from row vectors.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = names.len();
        let mut columns = vec![Vec::with_capacity(rows.len()); n_cols];
        for (r, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(SieveError::data(format!(
                    "Row {} has {} values, expected {}",
                    r,
                    row.len(),
                    n_cols
                )));
            }
            for (j, &v) in row.iter().enumerate() {
                columns[j].push(v);
            }
        }
        let mut m = Self::new(names, columns)?;
        m.n_rows = rows.len();
        Ok(m)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn feature_set(&self) -> FeatureSet {
        FeatureSet::new(self.names.iter().cloned())
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.columns[j]
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.index_of(name).map(|j| self.columns[j].as_slice())
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.columns[col][row]
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows).map(|i| self.row(i)).collect()
    }

    /// Keep only the named features, in the order of `features`.
    ///
    /// Asking for a feature the matrix does not hold is a configuration error.
    pub fn select(&self, features: &FeatureSet) -> Result<FeatureMatrix> {
        let mut names = Vec::with_capacity(features.len());
        let mut columns = Vec::with_capacity(features.len());
        for name in features {
            let j = self.index_of(name).ok_or_else(|| {
                SieveError::config(format!("Unknown feature '{}'", name))
            })?;
            names.push(name.clone());
            columns.push(self.columns[j].clone());
        }
        Ok(FeatureMatrix {
            names,
            columns,
            n_rows: self.n_rows,
        })
    }

    /// Keep only the given rows, in the given order (repeats allowed).
    pub fn take_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
            n_rows: indices.len(),
        }
    }

    /// Append rows (used by synthetic over-sampling).
    pub fn append_rows(&self, rows: &[Vec<f64>]) -> Result<FeatureMatrix> {
        let mut out = self.clone();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != out.n_cols() {
                return Err(SieveError::data(format!(
                    "Appended row {} has {} values, expected {}",
                    r,
                    row.len(),
                    out.n_cols()
                )));
            }
            for (j, &v) in row.iter().enumerate() {
                out.columns[j].push(v);
            }
        }
        out.n_rows += rows.len();
        Ok(out)
    }
}

/// Squared Euclidean distance between two rows
#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
