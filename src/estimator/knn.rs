//! k-nearest-neighbours learner and the shared neighbour search

use serde::{Deserialize, Serialize};

use super::linear::unknown_param;
use super::{check_predict_input, standardization, Estimator, ParamValue};
use crate::data::{squared_distance, FeatureMatrix, ProblemType};
use crate::error::Result;

/// Indices of the `k` points closest to `query` (squared Euclidean distance),
/// nearest first; equal distances resolve to the lower index.
///
/// # Arguments
/// * `points` - Candidate points, one row each
/// * `query` - Point to search around
/// * `k` - Number of neighbours to return (fewer if not enough points)
/// * `exclude` - Optional index to skip, typically the query's own row
pub fn nearest_neighbors(points: &[Vec<f64>], query: &[f64], k: usize, exclude: Option<usize>) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, p)| (squared_distance(p, query), i))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k).map(|(_, i)| i).collect()
}

/// Majority vote (classification) or mean (regression) over the k nearest
/// training rows, on standardised features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub n_neighbors: usize,
    #[serde(default)]
    means: Vec<f64>,
    #[serde(default)]
    scales: Vec<f64>,
    #[serde(default)]
    train_rows: Vec<Vec<f64>>,
    #[serde(default)]
    train_y: Vec<f64>,
    #[serde(default)]
    problem: Option<ProblemType>,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            means: Vec::new(),
            scales: Vec::new(),
            train_rows: Vec::new(),
            train_y: Vec::new(),
            problem: None,
        }
    }
}

impl KNearestNeighbors {
    fn scaled_row(&self, x: &FeatureMatrix, row: usize) -> Vec<f64> {
        (0..x.n_cols())
            .map(|j| (x.get(row, j) - self.means[j]) / self.scales[j])
            .collect()
    }

    fn fitted_features(&self) -> Option<usize> {
        self.problem.map(|_| self.means.len())
    }
}

/// Most frequent class; ties go to the smallest class id.
fn majority_vote(labels: impl Iterator<Item = f64>) -> f64 {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for label in labels {
        let id = label.round() as i64;
        match counts.iter_mut().find(|(c, _)| *c == id) {
            Some(entry) => entry.1 += 1,
            None => counts.push((id, 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(c, _)| c as f64)
        .unwrap_or(0.0)
}

impl Estimator for KNearestNeighbors {
    fn name(&self) -> &'static str {
        "K-Nearest Neighbors"
    }

    fn supports(&self, _problem: ProblemType) -> bool {
        true
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        let (means, scales) = standardization(x);
        self.means = means;
        self.scales = scales;
        self.train_rows = (0..x.n_rows()).map(|i| self.scaled_row(x, i)).collect();
        self.train_y = y.to_vec();
        self.problem = Some(problem);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(self.name(), self.fitted_features(), x)?;
        let k = self.n_neighbors.min(self.train_rows.len()).max(1);
        Ok((0..x.n_rows())
            .map(|i| {
                let query = self.scaled_row(x, i);
                let neighbors = nearest_neighbors(&self.train_rows, &query, k, None);
                let labels = neighbors.iter().map(|&n| self.train_y[n]);
                match self.problem {
                    Some(ProblemType::Classification) => majority_vote(labels),
                    _ => labels.sum::<f64>() / neighbors.len() as f64,
                }
            })
            .collect())
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "n_neighbors" => self.n_neighbors = value.as_usize(key)?.max(1),
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["n_neighbors"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_neighbors_order_and_exclusion() {
        let points = vec![vec![0.0], vec![1.0], vec![3.0], vec![-1.0]];
        assert_eq!(nearest_neighbors(&points, &[0.0], 3, Some(0)), vec![1, 3, 2]);
        assert_eq!(nearest_neighbors(&points, &[0.0], 10, None).len(), 4);
    }

    #[test]
    fn test_majority_vote_tie_goes_to_smallest_class() {
        assert_eq!(majority_vote([2.0, 1.0, 2.0, 1.0].into_iter()), 1.0);
        assert_eq!(majority_vote([0.0, 2.0, 2.0].into_iter()), 2.0);
    }

    #[test]
    fn test_knn_regression_mean() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![0.0, 1.0, 2.0, 10.0]]).unwrap();
        let y = vec![1.0, 2.0, 3.0, 100.0];
        let mut model = KNearestNeighbors::default();
        model.set_param("n_neighbors", &ParamValue::Int(3)).unwrap();
        model.fit(&x, &y, ProblemType::Regression).unwrap();
        let query = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0]]).unwrap();
        assert_eq!(model.predict(&query).unwrap(), vec![2.0]);
    }
}
