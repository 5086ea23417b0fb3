//! CART decision tree
//!
//! Binary splits on numeric thresholds, grown greedily:
//! 1. Sort the node's rows by each candidate feature
//! 2. Sweep the sorted rows keeping running left-side statistics
//! 3. Take the split with the largest impurity decrease (Gini for
//!    classification, variance for regression)
//! 4. Recurse until depth, size or purity limits stop growth
//!
//! Impurity decreases are accumulated per feature and normalised into
//! feature importances.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::linear::unknown_param;
use super::{argmax, check_predict_input, class_count, Estimator, ParamValue};
use crate::data::{FeatureMatrix, ProblemType};
use crate::error::{Result, SieveError};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Class distribution (classification) or `[mean]` (regression)
    Leaf { value: Vec<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Position in the feature-sorted row order where the right side starts
    split_at: usize,
    sorted: Vec<usize>,
    decrease: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` considers all of them
    pub max_features: Option<usize>,
    pub seed: u64,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    n_features: Option<usize>,
    #[serde(default)]
    n_classes: usize,
    #[serde(default)]
    problem: Option<ProblemType>,
    #[serde(default)]
    importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(seed: u64) -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed,
            nodes: Vec::new(),
            n_features: None,
            n_classes: 0,
            problem: None,
            importances: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fit on a subset of rows (repeats allowed, as in bootstrap samples).
    ///
    /// `n_classes` fixes the width of leaf distributions so trees grown on
    /// different samples stay comparable.
    pub(crate) fn fit_rows(
        &mut self,
        x: &FeatureMatrix,
        y: &[f64],
        rows: &[usize],
        problem: ProblemType,
        n_classes: usize,
    ) -> Result<()> {
        if rows.is_empty() {
            return Err(SieveError::fit("Cannot grow a tree on zero rows"));
        }
        self.nodes.clear();
        self.n_features = Some(x.n_cols());
        self.n_classes = n_classes;
        self.problem = Some(problem);
        self.importances = vec![0.0; x.n_cols()];

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.grow(x, y, rows.to_vec(), 0, &mut rng);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    /// Grow the subtree for `rows`, returning its node index
    fn grow(&mut self, x: &FeatureMatrix, y: &[f64], rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let leaf_value = self.leaf_value(y, &rows);
        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        let too_small = rows.len() < self.min_samples_split.max(2 * self.min_samples_leaf);

        if depth_reached || too_small || self.impurity_of(y, &rows) <= 1e-12 {
            return self.push(Node::Leaf { value: leaf_value });
        }

        let Some(best) = self.best_split(x, y, &rows, rng) else {
            return self.push(Node::Leaf { value: leaf_value });
        };

        self.importances[best.feature] += best.decrease;
        let (left_rows, right_rows) = best.sorted.split_at(best.split_at);
        let (left_rows, right_rows) = (left_rows.to_vec(), right_rows.to_vec());

        // Reserve the split slot before children so the root stays at 0
        let index = self.push(Node::Leaf { value: Vec::new() });
        let left = self.grow(x, y, left_rows, depth + 1, rng);
        let right = self.grow(x, y, right_rows, depth + 1, rng);
        self.nodes[index] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        index
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn candidate_features(&self, n_cols: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m < n_cols => {
                let mut picked = rand::seq::index::sample(rng, n_cols, m.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_cols).collect(),
        }
    }

    fn best_split(&self, x: &FeatureMatrix, y: &[f64], rows: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n = rows.len();
        let parent = self.impurity_of(y, rows) * n as f64;
        let mut best: Option<SplitCandidate> = None;

        for feature in self.candidate_features(x.n_cols(), rng) {
            let col = x.column(feature);
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| col[a].total_cmp(&col[b]));

            let mut sweep = Sweep::new(self.problem_or_default(), self.n_classes, y, &sorted);
            let mut local_best: Option<(usize, f64)> = None;

            for i in 0..n - 1 {
                sweep.move_left(y[sorted[i]]);
                let left_count = i + 1;
                let right_count = n - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }
                // Skip if this value equals the next (no threshold separates them)
                if (col[sorted[i]] - col[sorted[i + 1]]).abs() < 1e-10 {
                    continue;
                }
                let decrease = parent - sweep.weighted_children();
                if decrease > local_best.map_or(1e-12, |(_, d)| d) {
                    local_best = Some((left_count, decrease));
                }
            }

            if let Some((split_at, decrease)) = local_best {
                if best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    let threshold = (col[sorted[split_at - 1]] + col[sorted[split_at]]) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        split_at,
                        sorted,
                        decrease,
                    });
                }
            }
        }
        best
    }

    fn problem_or_default(&self) -> ProblemType {
        self.problem.unwrap_or(ProblemType::Regression)
    }

    fn impurity_of(&self, y: &[f64], rows: &[usize]) -> f64 {
        match self.problem_or_default() {
            ProblemType::Classification => {
                let mut counts = vec![0.0; self.n_classes];
                for &r in rows {
                    counts[y[r].round() as usize] += 1.0;
                }
                gini_impurity(&counts, rows.len() as f64)
            }
            ProblemType::Regression => {
                let n = rows.len() as f64;
                let sum: f64 = rows.iter().map(|&r| y[r]).sum();
                let sum_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
                variance(sum, sum_sq, n)
            }
        }
    }

    fn leaf_value(&self, y: &[f64], rows: &[usize]) -> Vec<f64> {
        let n = rows.len() as f64;
        match self.problem_or_default() {
            ProblemType::Classification => {
                let mut dist = vec![0.0; self.n_classes];
                for &r in rows {
                    dist[y[r].round() as usize] += 1.0;
                }
                dist.iter_mut().for_each(|d| *d /= n);
                dist
            }
            ProblemType::Regression => vec![rows.iter().map(|&r| y[r]).sum::<f64>() / n],
        }
    }

    fn leaf_for(&self, x: &FeatureMatrix, row: usize) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x.get(row, *feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Leaf class distributions per row (classification trees)
    pub(crate) fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        check_predict_input(self.name(), self.n_features, x)?;
        Ok((0..x.n_rows()).map(|i| self.leaf_for(x, i).to_vec()).collect())
    }

    /// Number of nodes in the fitted tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Running left/right statistics for a sorted sweep
enum Sweep {
    Classes {
        left: Vec<f64>,
        total: Vec<f64>,
        n_left: f64,
        n: f64,
    },
    Moments {
        left_sum: f64,
        left_sq: f64,
        sum: f64,
        sq: f64,
        n_left: f64,
        n: f64,
    },
}

impl Sweep {
    fn new(problem: ProblemType, n_classes: usize, y: &[f64], rows: &[usize]) -> Self {
        let n = rows.len() as f64;
        match problem {
            ProblemType::Classification => {
                let mut total = vec![0.0; n_classes];
                for &r in rows {
                    total[y[r].round() as usize] += 1.0;
                }
                Sweep::Classes {
                    left: vec![0.0; n_classes],
                    total,
                    n_left: 0.0,
                    n,
                }
            }
            ProblemType::Regression => Sweep::Moments {
                left_sum: 0.0,
                left_sq: 0.0,
                sum: rows.iter().map(|&r| y[r]).sum(),
                sq: rows.iter().map(|&r| y[r] * y[r]).sum(),
                n_left: 0.0,
                n,
            },
        }
    }

    fn move_left(&mut self, value: f64) {
        match self {
            Sweep::Classes { left, n_left, .. } => {
                left[value.round() as usize] += 1.0;
                *n_left += 1.0;
            }
            Sweep::Moments {
                left_sum,
                left_sq,
                n_left,
                ..
            } => {
                *left_sum += value;
                *left_sq += value * value;
                *n_left += 1.0;
            }
        }
    }

    /// Sum of child impurities weighted by child size
    fn weighted_children(&self) -> f64 {
        match self {
            Sweep::Classes {
                left,
                total,
                n_left,
                n,
            } => {
                let right: Vec<f64> = total.iter().zip(left.iter()).map(|(t, l)| t - l).collect();
                let n_right = n - n_left;
                n_left * gini_impurity(left, *n_left) + n_right * gini_impurity(&right, n_right)
            }
            Sweep::Moments {
                left_sum,
                left_sq,
                sum,
                sq,
                n_left,
                n,
            } => {
                let n_right = n - n_left;
                n_left * variance(*left_sum, *left_sq, *n_left)
                    + n_right * variance(sum - left_sum, sq - left_sq, n_right)
            }
        }
    }
}

/// Gini impurity for class counts: 1 - Σ p_k²
fn gini_impurity(counts: &[f64], total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

fn variance(sum: f64, sum_sq: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

impl Estimator for DecisionTree {
    fn name(&self) -> &'static str {
        "Decision Tree"
    }

    fn supports(&self, _problem: ProblemType) -> bool {
        true
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], problem: ProblemType) -> Result<()> {
        let n_classes = match problem {
            ProblemType::Classification => class_count(y).max(2),
            ProblemType::Regression => 0,
        };
        let rows: Vec<usize> = (0..x.n_rows()).collect();
        self.fit_rows(x, y, &rows, problem, n_classes)
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        check_predict_input(self.name(), self.n_features, x)?;
        let classify = self.problem == Some(ProblemType::Classification);
        Ok((0..x.n_rows())
            .map(|i| {
                let value = self.leaf_for(x, i);
                if classify {
                    argmax(value) as f64
                } else {
                    value[0]
                }
            })
            .collect())
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "max_depth" => self.max_depth = value.as_opt_usize(key)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(key)?.max(1),
            "min_samples_split" => self.min_samples_split = value.as_usize(key)?.max(2),
            "max_features" => self.max_features = value.as_opt_usize(key)?,
            _ => return Err(unknown_param(self.name(), key, self.supported_params())),
        }
        Ok(())
    }

    fn supported_params(&self) -> &'static [&'static str] {
        &["max_depth", "min_samples_leaf", "min_samples_split", "max_features"]
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.n_features.map(|_| self.importances.clone())
    }
}
