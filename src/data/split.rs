//! Train/test partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::{FeatureMatrix, FeatureSet};
use crate::error::{Result, SieveError};

/// A row partition of the feature matrix and target.
///
/// Regenerated whenever the test fraction or seed changes; downstream trainers
/// only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
    /// Source row of each training sample
    pub train_index: Vec<usize>,
    /// Source row of each test sample
    pub test_index: Vec<usize>,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Split {
    /// Narrow both partitions to the given features.
    pub fn select(&self, features: &FeatureSet) -> Result<Split> {
        Ok(Split {
            x_train: self.x_train.select(features)?,
            x_test: self.x_test.select(features)?,
            ..self.clone()
        })
    }

    /// Replace the training partition, leaving the test partition untouched.
    ///
    /// Resampled rows have no source row, so `train_index` is cleared.
    pub fn with_training(&self, x_train: FeatureMatrix, y_train: Vec<f64>) -> Split {
        Split {
            x_train,
            y_train,
            train_index: Vec::new(),
            ..self.clone()
        }
    }
}

/// Partition rows into training and test sets.
///
/// # Arguments
/// * `x` - Feature matrix
/// * `y` - Target values (class ids when `stratify` is set)
/// * `test_fraction` - Share of rows held out, in (0, 1)
/// * `seed` - Shuffle seed
/// * `stratify` - Keep class proportions in both partitions
pub fn train_test_split(
    x: &FeatureMatrix,
    y: &[f64],
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SieveError::config(format!(
            "Test fraction must be between 0 and 1 (exclusive), got {}",
            test_fraction
        )));
    }
    let n = x.n_rows();
    if n != y.len() {
        return Err(SieveError::data(format!(
            "Target has {} rows but features have {}",
            y.len(),
            n
        )));
    }
    if n < 2 {
        return Err(SieveError::data("At least 2 rows are needed for a train/test split"));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let (mut train_index, mut test_index) = if stratify {
        stratified_indices(y, test_fraction, &mut rng)?
    } else {
        let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(&mut rng);
        let test = idx[..n_test].to_vec();
        let train = idx[n_test..].to_vec();
        (train, test)
    };

    train_index.sort_unstable();
    test_index.sort_unstable();

    log::debug!(
        "Split {} rows into {} train / {} test (seed {})",
        n,
        train_index.len(),
        test_index.len(),
        seed
    );

    Ok(Split {
        x_train: x.take_rows(&train_index),
        x_test: x.take_rows(&test_index),
        y_train: train_index.iter().map(|&i| y[i]).collect(),
        y_test: test_index.iter().map(|&i| y[i]).collect(),
        train_index,
        test_index,
        test_fraction,
        seed,
    })
}

/// Per-class shuffled split; each class contributes at least one test row
/// and keeps at least one training row.
fn stratified_indices(
    y: &[f64],
    test_fraction: f64,
    rng: &mut StdRng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let groups = class_groups(y);
    if groups.len() < 2 {
        return Err(SieveError::data(
            "Stratified split needs at least two classes in the target",
        ));
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut indices) in groups {
        indices.shuffle(rng);
        let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
            .max(1)
            .min(indices.len().saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(SieveError::data(
            "Stratified split resulted in an empty train or test partition",
        ));
    }
    Ok((train, test))
}

/// Row indices grouped by class id, in ascending class order
pub fn class_groups(y: &[f64]) -> Vec<(usize, Vec<usize>)> {
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for (i, &label) in y.iter().enumerate() {
        let class = label.round() as usize;
        match groups.iter_mut().find(|(c, _)| *c == class) {
            Some((_, idx)) => idx.push(i),
            None => groups.push((class, vec![i])),
        }
    }
    groups.sort_by_key(|(c, _)| *c);
    groups
}

/// Sample count per class id, in ascending class order
pub fn class_counts(y: &[f64]) -> Vec<(usize, usize)> {
    class_groups(y)
        .into_iter()
        .map(|(c, idx)| (c, idx.len()))
        .collect()
}
