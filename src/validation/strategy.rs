//! Validation strategies: hold-out and the folding schemes
//!
//! Folding plans partition the training partition into train/validation folds
//! and fit an independent copy of the estimator on each, in parallel.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{class_groups, FeatureMatrix, ProblemType, Split};
use crate::error::{Result, SieveError};
use crate::estimator::{Estimator, Model};
use crate::metrics::{mean_std, ScoringMetric};

/// Bounds on leave-p-out enumeration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldLimits {
    /// Largest accepted p (further capped at n - 1)
    pub max_p: usize,
    /// Largest accepted C(n, p)
    pub max_combinations: u64,
}

impl Default for FoldLimits {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_combinations: 10_000,
        }
    }
}

/// How generalisation performance is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationPlan {
    /// Fit on the split's training rows, score on its test rows
    HoldOut,
    KFold {
        n_splits: usize,
        shuffle: bool,
        seed: u64,
    },
    /// Classification only; folds keep class proportions
    StratifiedKFold {
        n_splits: usize,
        shuffle: bool,
        seed: u64,
    },
    LeaveOneOut,
    /// Every size-p validation subset
    LeavePOut { p: usize },
}

/// Row indices of one fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Per-fold scores and their summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldScores {
    pub metric: ScoringMetric,
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl FoldScores {
    pub fn new(metric: ScoringMetric, scores: Vec<f64>) -> Self {
        let (mean, std) = mean_std(&scores);
        Self {
            metric,
            scores,
            mean,
            std,
        }
    }
}

impl ValidationPlan {
    pub fn k_fold(n_splits: usize) -> Self {
        ValidationPlan::KFold {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    pub fn stratified(n_splits: usize, seed: u64) -> Self {
        ValidationPlan::StratifiedKFold {
            n_splits,
            shuffle: true,
            seed,
        }
    }

    pub fn is_folding(&self) -> bool {
        !matches!(self, ValidationPlan::HoldOut)
    }

    /// Parameter checks that do not depend on the data
    pub fn validate(&self, problem: ProblemType) -> Result<()> {
        match *self {
            ValidationPlan::KFold { n_splits, .. } | ValidationPlan::StratifiedKFold { n_splits, .. }
                if n_splits < 2 =>
            {
                Err(SieveError::config(format!(
                    "Folding needs at least 2 splits, got {}",
                    n_splits
                )))
            }
            ValidationPlan::StratifiedKFold { .. } if problem != ProblemType::Classification => Err(
                SieveError::config("Stratified k-fold is only defined for classification"),
            ),
            ValidationPlan::LeavePOut { p: 0 } => Err(SieveError::config("Leave-p-out needs p >= 1")),
            _ => Ok(()),
        }
    }

    /// Build the folds for `n` rows with targets `y`.
    ///
    /// # Errors
    /// * `Configuration` for HoldOut (it has no folds), more splits than rows,
    ///   or a leave-p-out enumeration beyond `limits`
    /// * `Data` when stratifying a single-class target
    pub fn folds(&self, y: &[f64], limits: &FoldLimits) -> Result<Vec<Fold>> {
        let n = y.len();
        match *self {
            ValidationPlan::HoldOut => Err(SieveError::config(
                "Hold-out uses the train/test split and has no folds",
            )),
            ValidationPlan::KFold {
                n_splits,
                shuffle,
                seed,
            } => {
                check_split_count(n_splits, n)?;
                let mut order: Vec<usize> = (0..n).collect();
                if shuffle {
                    order.shuffle(&mut StdRng::seed_from_u64(seed));
                }
                Ok(contiguous_folds(&order, n_splits, n))
            }
            ValidationPlan::StratifiedKFold {
                n_splits,
                shuffle,
                seed,
            } => stratified_folds(y, n_splits, shuffle, seed),
            ValidationPlan::LeaveOneOut => {
                if n < 2 {
                    return Err(SieveError::config("Leave-one-out needs at least 2 rows"));
                }
                Ok((0..n)
                    .map(|i| Fold {
                        train: (0..n).filter(|&j| j != i).collect(),
                        validation: vec![i],
                    })
                    .collect())
            }
            ValidationPlan::LeavePOut { p } => leave_p_out_folds(n, p, limits),
        }
    }

    /// Cross-validate an unfitted estimator over `x` / `y`.
    ///
    /// Each fold fits its own clone of `template`; folds run in parallel and
    /// share nothing.
    pub fn cross_validate(
        &self,
        template: &Model,
        x: &FeatureMatrix,
        y: &[f64],
        problem: ProblemType,
        metric: ScoringMetric,
        limits: &FoldLimits,
    ) -> Result<FoldScores> {
        self.validate(problem)?;
        let folds = self.folds(y, limits)?;
        debug!("{}: {} folds over {} rows", self, folds.len(), y.len());

        let scores: Result<Vec<f64>> = folds
            .par_iter()
            .map(|fold| {
                let mut model = template.clone();
                let x_train = x.take_rows(&fold.train);
                let y_train: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
                model.fit(&x_train, &y_train, problem)?;

                let x_val = x.take_rows(&fold.validation);
                let y_val: Vec<f64> = fold.validation.iter().map(|&i| y[i]).collect();
                let y_pred = model.predict(&x_val)?;
                metric.score(&y_val, &y_pred)
            })
            .collect();

        Ok(FoldScores::new(metric, scores?))
    }

    /// Evaluate under this plan: HoldOut scores once on the split's test rows,
    /// folding plans cross-validate over the training rows.
    pub fn evaluate(
        &self,
        template: &Model,
        split: &Split,
        problem: ProblemType,
        metric: ScoringMetric,
        limits: &FoldLimits,
    ) -> Result<FoldScores> {
        match self {
            ValidationPlan::HoldOut => {
                let mut model = template.clone();
                model.fit(&split.x_train, &split.y_train, problem)?;
                let y_pred = model.predict(&split.x_test)?;
                let score = metric.score(&split.y_test, &y_pred)?;
                Ok(FoldScores::new(metric, vec![score]))
            }
            _ => self.cross_validate(template, &split.x_train, &split.y_train, problem, metric, limits),
        }
    }
}

fn check_split_count(n_splits: usize, n: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(SieveError::config(format!(
            "Folding needs at least 2 splits, got {}",
            n_splits
        )));
    }
    if n_splits > n {
        return Err(SieveError::config(format!(
            "Cannot make {} folds from {} rows",
            n_splits, n
        )));
    }
    Ok(())
}

/// Cut `order` into `k` consecutive blocks; the first `n % k` blocks get one
/// extra row.
fn contiguous_folds(order: &[usize], k: usize, n: usize) -> Vec<Fold> {
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        let end = start + size;
        let mut validation = order[start..end].to_vec();
        validation.sort_unstable();
        let mut train: Vec<usize> = order[..start].iter().chain(order[end..].iter()).copied().collect();
        train.sort_unstable();
        folds.push(Fold { train, validation });
        start = end;
    }
    folds
}

/// Deal each class's rows round-robin across folds, continuing the rotation
/// from one class to the next so fold sizes stay within one of each other.
fn stratified_folds(y: &[f64], k: usize, shuffle: bool, seed: u64) -> Result<Vec<Fold>> {
    let n = y.len();
    let groups = class_groups(y);
    if groups.len() < 2 {
        return Err(SieveError::data(
            "Stratified folding needs at least two classes in the target",
        ));
    }
    check_split_count(k, n)?;

    let smallest = groups.iter().map(|(_, rows)| rows.len()).min().unwrap_or(0);
    if smallest < k {
        warn!(
            "The least populated class has {} rows, fewer than the {} folds requested",
            smallest, k
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; n];
    let mut position = 0;
    for (_, rows) in groups {
        let mut rows = rows;
        if shuffle {
            rows.shuffle(&mut rng);
        }
        for row in rows {
            assignment[row] = position % k;
            position += 1;
        }
    }

    Ok((0..k)
        .map(|f| Fold {
            train: (0..n).filter(|&i| assignment[i] != f).collect(),
            validation: (0..n).filter(|&i| assignment[i] == f).collect(),
        })
        .collect())
}

/// C(n, k), or `None` on overflow
pub fn binomial(n: usize, k: usize) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc.checked_mul((n - i) as u128)? / (i as u128 + 1);
        if acc > u64::MAX as u128 {
            return None;
        }
    }
    Some(acc as u64)
}

fn leave_p_out_folds(n: usize, p: usize, limits: &FoldLimits) -> Result<Vec<Fold>> {
    if p == 0 {
        return Err(SieveError::config("Leave-p-out needs p >= 1"));
    }
    if n < 2 {
        return Err(SieveError::config("Leave-p-out needs at least 2 rows"));
    }
    let cap = limits.max_p.min(n - 1);
    if p > cap {
        return Err(SieveError::config(format!(
            "Leave-p-out with p = {} exceeds the cap of {} for {} rows",
            p, cap, n
        )));
    }
    match binomial(n, p) {
        Some(count) if count <= limits.max_combinations => {}
        Some(count) => {
            return Err(SieveError::config(format!(
                "Leave-p-out would fit C({}, {}) = {} folds, above the limit of {}",
                n, p, count, limits.max_combinations
            )))
        }
        None => {
            return Err(SieveError::config(format!(
                "Leave-p-out C({}, {}) is too large to enumerate",
                n, p
            )))
        }
    }

    // Lexicographic enumeration of p-subsets
    let mut folds = Vec::new();
    let mut combo: Vec<usize> = (0..p).collect();
    loop {
        folds.push(Fold {
            train: (0..n).filter(|i| !combo.contains(i)).collect(),
            validation: combo.clone(),
        });
        let mut i = p;
        while i > 0 && combo[i - 1] == n - p + i - 1 {
            i -= 1;
        }
        if i == 0 {
            break;
        }
        combo[i - 1] += 1;
        for j in i..p {
            combo[j] = combo[j - 1] + 1;
        }
    }
    Ok(folds)
}

impl std::fmt::Display for ValidationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationPlan::HoldOut => write!(f, "hold-out"),
            ValidationPlan::KFold { n_splits, .. } => write!(f, "{}-fold", n_splits),
            ValidationPlan::StratifiedKFold { n_splits, .. } => write!(f, "stratified {}-fold", n_splits),
            ValidationPlan::LeaveOneOut => write!(f, "leave-one-out"),
            ValidationPlan::LeavePOut { p } => write!(f, "leave-{}-out", p),
        }
    }
}

impl std::str::FromStr for ValidationPlan {
    type Err = String;

    /// `holdout`, `kfold[:k]`, `stratified[:k]`, `loo`, `lpo:p`.
    /// Folding plans parsed here do not shuffle; callers add a seed if wanted.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lower.as_str(), None),
        };
        let parse_count = |default: usize| -> std::result::Result<usize, String> {
            match arg {
                Some(a) => a.parse().map_err(|_| format!("Invalid fold count: '{}'", a)),
                None => Ok(default),
            }
        };
        match name {
            "holdout" | "hold-out" | "hold_out" => Ok(ValidationPlan::HoldOut),
            "kfold" | "k-fold" => Ok(ValidationPlan::k_fold(parse_count(5)?)),
            "stratified" | "stratified_kfold" | "skfold" => Ok(ValidationPlan::StratifiedKFold {
                n_splits: parse_count(5)?,
                shuffle: false,
                seed: 0,
            }),
            "loo" | "leave_one_out" | "leave-one-out" => Ok(ValidationPlan::LeaveOneOut),
            "lpo" | "leave_p_out" | "leave-p-out" => {
                let p = arg
                    .ok_or_else(|| "Leave-p-out needs p, e.g. lpo:2".to_string())?
                    .parse()
                    .map_err(|_| format!("Invalid p in '{}'", s))?;
                Ok(ValidationPlan::LeavePOut { p })
            }
            _ => Err(format!(
                "Unknown validation plan: '{}'. Use holdout, kfold:k, stratified:k, loo or lpo:p.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kfold_uneven_sizes() {
        let y = vec![0.0; 7];
        let folds = ValidationPlan::k_fold(3).folds(&y, &FoldLimits::default()).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn test_kfold_shuffle_is_seeded() {
        let y = vec![0.0; 30];
        let plan = ValidationPlan::KFold {
            n_splits: 3,
            shuffle: true,
            seed: 9,
        };
        let a = plan.folds(&y, &FoldLimits::default()).unwrap();
        let b = plan.folds(&y, &FoldLimits::default()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0].validation, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_many_splits() {
        let y = vec![0.0; 3];
        let err = ValidationPlan::k_fold(4).folds(&y, &FoldLimits::default()).unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
    }

    #[test]
    fn test_stratified_keeps_proportions() {
        let y: Vec<f64> = (0..30).map(|i| if i < 20 { 0.0 } else { 1.0 }).collect();
        let folds = ValidationPlan::stratified(5, 1).folds(&y, &FoldLimits::default()).unwrap();
        for fold in &folds {
            let ones = fold.validation.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(fold.validation.len(), 6);
            assert_eq!(ones, 2);
        }
    }

    #[test]
    fn test_stratified_single_class_is_data_error() {
        let y = vec![1.0; 10];
        let err = ValidationPlan::stratified(2, 0).folds(&y, &FoldLimits::default()).unwrap_err();
        assert!(matches!(err, SieveError::Data(_)));
    }

    #[test]
    fn test_stratified_rejects_regression() {
        let plan = ValidationPlan::stratified(3, 0);
        assert!(plan.validate(ProblemType::Regression).is_err());
        assert!(plan.validate(ProblemType::Classification).is_ok());
    }

    #[test]
    fn test_leave_p_out_enumerates_all_subsets() {
        let y = vec![0.0; 5];
        let folds = ValidationPlan::LeavePOut { p: 2 }
            .folds(&y, &FoldLimits::default())
            .unwrap();
        assert_eq!(folds.len(), 10);
        assert_eq!(folds[0].validation, vec![0, 1]);
        assert_eq!(folds[9].validation, vec![3, 4]);
        assert!(folds.iter().all(|f| f.train.len() == 3));
    }

    #[test]
    fn test_leave_p_out_bounds() {
        let limits = FoldLimits::default();
        // p above the cap
        assert!(ValidationPlan::LeavePOut { p: 6 }.folds(&vec![0.0; 50], &limits).is_err());
        // p = n is capped at n - 1
        assert!(ValidationPlan::LeavePOut { p: 3 }.folds(&vec![0.0; 3], &limits).is_err());
        // C(100, 3) = 161700 > 10000
        assert!(ValidationPlan::LeavePOut { p: 3 }.folds(&vec![0.0; 100], &limits).is_err());
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 2), Some(10));
        assert_eq!(binomial(100, 3), Some(161_700));
        assert_eq!(binomial(3, 5), Some(0));
        assert_eq!(binomial(10_000, 5000), None);
    }

    #[test]
    fn test_holdout_has_no_folds() {
        assert!(ValidationPlan::HoldOut.folds(&[0.0, 1.0], &FoldLimits::default()).is_err());
    }

    #[test]
    fn test_plan_from_str() {
        assert_eq!("kfold:10".parse::<ValidationPlan>().unwrap(), ValidationPlan::k_fold(10));
        assert_eq!("loo".parse::<ValidationPlan>().unwrap(), ValidationPlan::LeaveOneOut);
        assert_eq!(
            "lpo:2".parse::<ValidationPlan>().unwrap(),
            ValidationPlan::LeavePOut { p: 2 }
        );
        assert!("lpo".parse::<ValidationPlan>().is_err());
    }
}
