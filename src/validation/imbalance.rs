//! Class-imbalance correction for the training partition
//!
//! Resamplers only ever see `x_train` / `y_train`; the test partition of the
//! split is carried over untouched. A failed correction leaves the training
//! partition as it was and says why.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{class_counts, class_groups, FeatureMatrix, ProblemType, Split};
use crate::error::{Result, SieveError};
use crate::estimator::nearest_neighbors;

/// Neighbours consulted by edited-nearest-neighbour cleaning
const ENN_NEIGHBORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resampler {
    /// Duplicate random minority rows up to the majority count
    RandomOver,
    /// Drop random rows of larger classes down to the minority count
    RandomUnder,
    /// Synthetic minority over-sampling with `k` in-class neighbours
    Smote { k: usize },
    /// SMOTE followed by edited-nearest-neighbour cleaning
    SmoteEnn { k: usize },
    /// SMOTE followed by Tomek-link removal
    SmoteTomek { k: usize },
}

impl std::fmt::Display for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resampler::RandomOver => write!(f, "random over-sampling"),
            Resampler::RandomUnder => write!(f, "random under-sampling"),
            Resampler::Smote { .. } => write!(f, "SMOTE"),
            Resampler::SmoteEnn { .. } => write!(f, "SMOTE + ENN"),
            Resampler::SmoteTomek { .. } => write!(f, "SMOTE + Tomek links"),
        }
    }
}

impl std::str::FromStr for Resampler {
    type Err = String;

    /// `over`, `under`, `smote`, `smote_enn`, `smote_tomek`; SMOTE variants take
    /// the default of 5 neighbours.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "over" | "random_over" | "ros" => Ok(Resampler::RandomOver),
            "under" | "random_under" | "rus" => Ok(Resampler::RandomUnder),
            "smote" => Ok(Resampler::Smote { k: 5 }),
            "smote_enn" | "smoteenn" => Ok(Resampler::SmoteEnn { k: 5 }),
            "smote_tomek" | "smotetomek" => Ok(Resampler::SmoteTomek { k: 5 }),
            _ => Err(format!(
                "Unknown resampler: '{}'. Use over, under, smote, smote_enn or smote_tomek.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    pub resampler: Resampler,
    /// Correct only when max/min class count exceeds this
    pub threshold: f64,
    pub seed: u64,
}

impl ImbalanceConfig {
    pub fn new(resampler: Resampler) -> Self {
        Self {
            resampler,
            threshold: 1.5,
            seed: 42,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold >= 1.0) {
            return Err(SieveError::config(format!(
                "Imbalance threshold must be at least 1.0, got {}",
                self.threshold
            )));
        }
        match self.resampler {
            Resampler::Smote { k: 0 } | Resampler::SmoteEnn { k: 0 } | Resampler::SmoteTomek { k: 0 } => {
                Err(SieveError::config("SMOTE needs at least one neighbour"))
            }
            _ => Ok(()),
        }
    }
}

/// What the corrector did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    /// Regression target; nothing to balance
    NotApplicable,
    /// Ratio at or under the threshold
    NotNeeded { ratio: f64 },
    Applied {
        resampler: Resampler,
        ratio_before: f64,
        ratio_after: f64,
        rows_before: usize,
        rows_after: usize,
    },
    /// Resampling failed; the original training partition was kept
    Failed {
        resampler: Resampler,
        ratio: f64,
        reason: String,
    },
}

impl std::fmt::Display for CorrectionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionOutcome::NotApplicable => write!(f, "not applicable"),
            CorrectionOutcome::NotNeeded { ratio } => write!(f, "not needed (ratio {:.2})", ratio),
            CorrectionOutcome::Applied {
                resampler,
                ratio_before,
                ratio_after,
                rows_before,
                rows_after,
            } => write!(
                f,
                "{}: ratio {:.2} -> {:.2}, rows {} -> {}",
                resampler, ratio_before, ratio_after, rows_before, rows_after
            ),
            CorrectionOutcome::Failed { resampler, reason, .. } => {
                write!(f, "{} failed: {}", resampler, reason)
            }
        }
    }
}

/// Largest over smallest class count; 1.0 for fewer than two classes.
pub fn imbalance_ratio(y: &[f64]) -> f64 {
    let counts = class_counts(y);
    if counts.len() < 2 {
        return 1.0;
    }
    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0) as f64;
    let min = counts.iter().map(|(_, c)| *c).min().unwrap_or(0) as f64;
    max / min
}

/// Correct the training partition of `split` when it is imbalanced.
///
/// Never fails: resampling errors become [`CorrectionOutcome::Failed`] and
/// the returned split equals the input.
pub fn correct_imbalance(split: &Split, problem: ProblemType, config: &ImbalanceConfig) -> (Split, CorrectionOutcome) {
    if problem != ProblemType::Classification {
        return (split.clone(), CorrectionOutcome::NotApplicable);
    }
    let ratio = imbalance_ratio(&split.y_train);
    if ratio <= config.threshold {
        info!(
            "Imbalance ratio {:.2} within threshold {:.2}; no correction",
            ratio, config.threshold
        );
        return (split.clone(), CorrectionOutcome::NotNeeded { ratio });
    }

    match resample(&split.x_train, &split.y_train, config) {
        Ok((x, y)) => {
            let outcome = CorrectionOutcome::Applied {
                resampler: config.resampler,
                ratio_before: ratio,
                ratio_after: imbalance_ratio(&y),
                rows_before: split.y_train.len(),
                rows_after: y.len(),
            };
            info!(
                "{}: {} -> {} training rows",
                config.resampler,
                split.y_train.len(),
                y.len()
            );
            (split.with_training(x, y), outcome)
        }
        Err(e) => {
            warn!("{} failed, keeping original training data: {}", config.resampler, e);
            (
                split.clone(),
                CorrectionOutcome::Failed {
                    resampler: config.resampler,
                    ratio,
                    reason: e.to_string(),
                },
            )
        }
    }
}

/// Apply the configured resampler to a training partition.
pub fn resample(x: &FeatureMatrix, y: &[f64], config: &ImbalanceConfig) -> Result<(FeatureMatrix, Vec<f64>)> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    match config.resampler {
        Resampler::RandomOver => Ok(random_over(x, y, &mut rng)),
        Resampler::RandomUnder => Ok(random_under(x, y, &mut rng)),
        Resampler::Smote { k } => smote(x, y, k, &mut rng),
        Resampler::SmoteEnn { k } => {
            let (x, y) = smote(x, y, k, &mut rng)?;
            edited_nearest_neighbours(&x, &y)
        }
        Resampler::SmoteTomek { k } => {
            let (x, y) = smote(x, y, k, &mut rng)?;
            remove_tomek_links(&x, &y)
        }
    }
}

fn random_over(x: &FeatureMatrix, y: &[f64], rng: &mut StdRng) -> (FeatureMatrix, Vec<f64>) {
    let groups = class_groups(y);
    let target = groups.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0);

    let mut indices: Vec<usize> = (0..y.len()).collect();
    for (_, rows) in &groups {
        for _ in rows.len()..target {
            indices.push(rows[rng.gen_range(0..rows.len())]);
        }
    }
    let y_out = indices.iter().map(|&i| y[i]).collect();
    (x.take_rows(&indices), y_out)
}

fn random_under(x: &FeatureMatrix, y: &[f64], rng: &mut StdRng) -> (FeatureMatrix, Vec<f64>) {
    let groups = class_groups(y);
    let target = groups.iter().map(|(_, rows)| rows.len()).min().unwrap_or(0);

    let mut indices: Vec<usize> = Vec::new();
    for (_, rows) in &groups {
        let picked = rand::seq::index::sample(rng, rows.len(), target);
        indices.extend(picked.iter().map(|p| rows[p]));
    }
    indices.sort_unstable();
    let y_out = indices.iter().map(|&i| y[i]).collect();
    (x.take_rows(&indices), y_out)
}

/// Synthetic minority over-sampling.
///
/// Every class below the majority count gets synthetic rows interpolated
/// between a random member and one of its `k` nearest same-class neighbours.
fn smote(x: &FeatureMatrix, y: &[f64], k: usize, rng: &mut StdRng) -> Result<(FeatureMatrix, Vec<f64>)> {
    let groups = class_groups(y);
    let target = groups.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0);
    let rows = x.rows();

    let mut synthetic: Vec<Vec<f64>> = Vec::new();
    let mut synthetic_y: Vec<f64> = Vec::new();

    for (class, members) in &groups {
        let needed = target - members.len();
        if needed == 0 {
            continue;
        }
        if members.len() <= k {
            return Err(SieveError::fit(format!(
                "SMOTE needs more than {} samples of class {}, found {}",
                k,
                class,
                members.len()
            )));
        }

        let points: Vec<Vec<f64>> = members.iter().map(|&i| rows[i].clone()).collect();
        let neighbours: Vec<Vec<usize>> = (0..points.len())
            .map(|i| nearest_neighbors(&points, &points[i], k, Some(i)))
            .collect();

        for _ in 0..needed {
            let i = rng.gen_range(0..points.len());
            let n = neighbours[i][rng.gen_range(0..neighbours[i].len())];
            let gap: f64 = rng.gen();
            let row = points[i]
                .iter()
                .zip(points[n].iter())
                .map(|(a, b)| a + gap * (b - a))
                .collect();
            synthetic.push(row);
            synthetic_y.push(*class as f64);
        }
    }

    let x_out = x.append_rows(&synthetic)?;
    let mut y_out = y.to_vec();
    y_out.extend(synthetic_y);
    Ok((x_out, y_out))
}

/// Drop every row whose nearest neighbours do not all share its class.
///
/// Runs after SMOTE has balanced the classes, so every class is cleaned,
/// the over-sampled one included; synthetic rows that landed inside another
/// class's region are removed with the rest.
fn edited_nearest_neighbours(x: &FeatureMatrix, y: &[f64]) -> Result<(FeatureMatrix, Vec<f64>)> {
    let rows = x.rows();
    let keep: Vec<usize> = (0..rows.len())
        .filter(|&i| {
            nearest_neighbors(&rows, &rows[i], ENN_NEIGHBORS, Some(i))
                .iter()
                .all(|&n| y[n].round() == y[i].round())
        })
        .collect();
    finish_cleaning(x, y, keep, "edited nearest neighbours")
}

/// Remove both rows of every Tomek link: a pair of mutual nearest neighbours
/// with different classes. Like ENN cleaning this applies to every class,
/// not only the majority.
fn remove_tomek_links(x: &FeatureMatrix, y: &[f64]) -> Result<(FeatureMatrix, Vec<f64>)> {
    let rows = x.rows();
    let nearest: Vec<Option<usize>> = (0..rows.len())
        .map(|i| nearest_neighbors(&rows, &rows[i], 1, Some(i)).first().copied())
        .collect();

    let keep: Vec<usize> = (0..rows.len())
        .filter(|&i| match nearest[i] {
            Some(j) => !(nearest[j] == Some(i) && y[i].round() != y[j].round()),
            None => true,
        })
        .collect();
    finish_cleaning(x, y, keep, "Tomek-link removal")
}

fn finish_cleaning(x: &FeatureMatrix, y: &[f64], keep: Vec<usize>, step: &str) -> Result<(FeatureMatrix, Vec<f64>)> {
    let classes_before = class_counts(y).len();
    let y_out: Vec<f64> = keep.iter().map(|&i| y[i]).collect();
    if class_counts(&y_out).len() < classes_before {
        return Err(SieveError::fit(format!("{} removed every row of a class", step)));
    }
    Ok((x.take_rows(&keep), y_out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::train_test_split;

    fn imbalanced(n_major: usize, n_minor: usize) -> (FeatureMatrix, Vec<f64>) {
        let n = n_major + n_minor;
        let a: Vec<f64> = (0..n)
            .map(|i| if i < n_major { i as f64 } else { 100.0 + i as f64 })
            .collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| if i < n_major { 0.0 } else { 1.0 }).collect();
        (FeatureMatrix::new(vec!["a".into(), "b".into()], vec![a, b]).unwrap(), y)
    }

    #[test]
    fn test_ratio() {
        assert_eq!(imbalance_ratio(&[0.0, 0.0, 0.0, 1.0]), 3.0);
        assert_eq!(imbalance_ratio(&[1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_random_over_balances() {
        let (x, y) = imbalanced(20, 5);
        let (x2, y2) = resample(&x, &y, &ImbalanceConfig::new(Resampler::RandomOver)).unwrap();
        assert_eq!(class_counts(&y2), vec![(0, 20), (1, 20)]);
        assert_eq!(x2.n_rows(), 40);
    }

    #[test]
    fn test_random_under_balances() {
        let (x, y) = imbalanced(20, 5);
        let (x2, y2) = resample(&x, &y, &ImbalanceConfig::new(Resampler::RandomUnder)).unwrap();
        assert_eq!(class_counts(&y2), vec![(0, 5), (1, 5)]);
        assert_eq!(x2.n_rows(), 10);
    }

    #[test]
    fn test_smote_synthetic_rows_lie_between_members() {
        let (x, y) = imbalanced(20, 8);
        let (x2, y2) = resample(&x, &y, &ImbalanceConfig::new(Resampler::Smote { k: 3 })).unwrap();
        assert_eq!(class_counts(&y2), vec![(0, 20), (1, 20)]);
        for i in 28..40 {
            let a = x2.get(i, 0);
            assert!((120.0..=127.0).contains(&a), "synthetic a = {}", a);
        }
    }

    #[test]
    fn test_smote_needs_more_than_k_samples() {
        let (x, y) = imbalanced(20, 3);
        let err = resample(&x, &y, &ImbalanceConfig::new(Resampler::Smote { k: 5 })).unwrap_err();
        assert!(matches!(err, SieveError::Fit(_)));
    }

    #[test]
    fn test_failed_correction_keeps_training_data() {
        let (x, y) = imbalanced(20, 3);
        let split = train_test_split(&x, &y, 0.2, 1, true).unwrap();
        let (out, outcome) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(Resampler::Smote { k: 5 }));
        assert!(matches!(outcome, CorrectionOutcome::Failed { .. }));
        assert_eq!(out, split);
    }

    #[test]
    fn test_test_partition_untouched() {
        let (x, y) = imbalanced(40, 10);
        let split = train_test_split(&x, &y, 0.2, 3, true).unwrap();
        for resampler in [
            Resampler::RandomOver,
            Resampler::RandomUnder,
            Resampler::Smote { k: 3 },
            Resampler::SmoteEnn { k: 3 },
            Resampler::SmoteTomek { k: 3 },
        ] {
            let (out, _) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(resampler));
            assert_eq!(out.x_test, split.x_test);
            assert_eq!(out.y_test, split.y_test);
            assert_eq!(out.test_index, split.test_index);
        }
    }

    #[test]
    fn test_balanced_data_not_corrected() {
        let (x, y) = imbalanced(10, 9);
        let split = train_test_split(&x, &y, 0.2, 3, true).unwrap();
        let (_, outcome) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(Resampler::Smote { k: 3 }));
        assert!(matches!(outcome, CorrectionOutcome::NotNeeded { .. }));
    }

    #[test]
    fn test_regression_not_applicable() {
        let (x, y) = imbalanced(10, 2);
        let split = train_test_split(&x, &y, 0.2, 3, false).unwrap();
        let (_, outcome) = correct_imbalance(&split, ProblemType::Regression, &ImbalanceConfig::new(Resampler::RandomOver));
        assert_eq!(outcome, CorrectionOutcome::NotApplicable);
    }

    #[test]
    fn test_tomek_link_removes_both_rows() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![0.0, 1.0, 5.0, 5.1, 10.0, 11.0]]).unwrap();
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let (x2, y2) = remove_tomek_links(&x, &y).unwrap();
        assert_eq!(x2.column(0), &[0.0, 1.0, 10.0, 11.0]);
        assert_eq!(y2, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_enn_cleans_every_class() {
        // Row 20.0 (class 1) lies nearer class 0, row 80.0 (class 0) nearer class 1
        let mut a: Vec<f64> = (0..8).map(|i| i as f64).collect();
        a.extend((0..8).map(|i| 100.0 + i as f64));
        a.extend([20.0, 80.0]);
        let mut y = vec![0.0; 8];
        y.extend(vec![1.0; 8]);
        y.extend([1.0, 0.0]);
        let x = FeatureMatrix::new(vec!["a".into()], vec![a]).unwrap();

        let (x2, y2) = edited_nearest_neighbours(&x, &y).unwrap();
        assert_eq!(x2.n_rows(), 16);
        assert!(!x2.column(0).contains(&20.0));
        assert!(!x2.column(0).contains(&80.0));
        assert_eq!(class_counts(&y2), vec![(0, 8), (1, 8)]);
    }
}
