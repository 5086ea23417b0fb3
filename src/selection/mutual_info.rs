//! Mutual information by equal-frequency discretisation
//!
//! Each feature (and a regression target) is cut into quantile bins; mutual
//! information is then the plug-in estimate over the joint bin histogram:
//! I(X;Y) = Σ p(x,y) · ln(p(x,y) / (p(x)·p(y)))   [nats]

use rayon::prelude::*;

use crate::data::{FeatureMatrix, ProblemType};

/// Assign each value to one of at most `bins` equal-frequency bins.
///
/// Equal values always share a bin, so a constant column collapses to one bin.
pub fn discretize(values: &[f64], bins: usize) -> Vec<usize> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let bins = bins.max(1);
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    // Upper edges at the interior quantiles, deduplicated
    let mut edges: Vec<f64> = (1..bins).map(|q| sorted[(q * n / bins).min(n - 1)]).collect();
    edges.dedup();
    edges.retain(|e| *e > sorted[0]);

    values
        .iter()
        .map(|v| edges.partition_point(|e| *e <= *v))
        .collect()
}

/// Plug-in mutual information (nats) between two discrete codes.
pub fn mutual_information(a: &[usize], b: &[usize]) -> f64 {
    let n = a.len();
    if n == 0 || n != b.len() {
        return 0.0;
    }
    let na = a.iter().max().map_or(0, |m| m + 1);
    let nb = b.iter().max().map_or(0, |m| m + 1);

    let mut joint = vec![0.0f64; na * nb];
    let mut pa = vec![0.0f64; na];
    let mut pb = vec![0.0f64; nb];
    for (&i, &j) in a.iter().zip(b.iter()) {
        joint[i * nb + j] += 1.0;
        pa[i] += 1.0;
        pb[j] += 1.0;
    }

    let total = n as f64;
    let mut mi = 0.0;
    for i in 0..na {
        for j in 0..nb {
            let c = joint[i * nb + j];
            if c > 0.0 {
                mi += (c / total) * ((c * total) / (pa[i] * pb[j])).ln();
            }
        }
    }
    mi.max(0.0)
}

/// Mutual information of every column of `x` with the target.
///
/// # Arguments
/// * `x` - Candidate features
/// * `y` - Class ids (classification) or continuous values (regression)
/// * `problem` - Decides whether `y` is used as-is or discretised
/// * `bins` - Bin count for features and a continuous target
pub fn mutual_info_scores(x: &FeatureMatrix, y: &[f64], problem: ProblemType, bins: usize) -> Vec<f64> {
    let target_codes: Vec<usize> = match problem {
        ProblemType::Classification => y.iter().map(|v| v.round().max(0.0) as usize).collect(),
        ProblemType::Regression => discretize(y, bins),
    };

    x.columns()
        .par_iter()
        .map(|col| mutual_information(&discretize(col, bins), &target_codes))
        .collect()
}
