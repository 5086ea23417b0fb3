//! Turning score tables into retained feature sets

use serde::{Deserialize, Serialize};

use super::scorer::ScoreTable;
use crate::data::FeatureSet;
use crate::error::{Result, SieveError};

/// How a stage converts scores into a feature subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "param", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Keep the `k` highest-scoring features
    TopN(usize),
    /// Keep every feature scoring at least this value
    Threshold(f64),
}

impl SelectionPolicy {
    /// Check the policy against the size of its input domain before any fit.
    pub fn validate(&self, domain_size: usize) -> Result<()> {
        match *self {
            SelectionPolicy::TopN(0) => Err(SieveError::config("TopN needs k >= 1")),
            SelectionPolicy::TopN(k) if k > domain_size => Err(SieveError::config(format!(
                "TopN asks for {} features but only {} are available",
                k, domain_size
            ))),
            SelectionPolicy::Threshold(t) if t.is_nan() => {
                Err(SieveError::config("Threshold must be a number"))
            }
            _ => Ok(()),
        }
    }

    /// Apply the policy.
    ///
    /// TopN orders by score descending with ties resolved by table order
    /// (the original column order), so repeated runs retain the same set.
    /// NaN scores rank last. Binary tables ignore the threshold value and keep
    /// the selected features.
    pub fn select(&self, scores: &ScoreTable) -> FeatureSet {
        match *self {
            SelectionPolicy::TopN(k) => {
                let mut ranked: Vec<(usize, f64)> = scores
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (i, if e.score.is_nan() { f64::NEG_INFINITY } else { e.score }))
                    .collect();
                // Stable sort keeps earlier columns ahead of equal scores
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

                let mut keep: Vec<usize> = ranked.into_iter().take(k).map(|(i, _)| i).collect();
                keep.sort_unstable();
                let entries: Vec<_> = scores.iter().collect();
                keep.into_iter().map(|i| entries[i].feature.clone()).collect()
            }
            SelectionPolicy::Threshold(t) => {
                let cutoff = if scores.binary { 1.0 } else { t };
                scores
                    .iter()
                    .filter(|e| e.score >= cutoff)
                    .map(|e| e.feature.clone())
                    .collect()
            }
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::TopN(k) => write!(f, "top={}", k),
            SelectionPolicy::Threshold(t) => write!(f, "threshold={}", t),
        }
    }
}

impl std::str::FromStr for SelectionPolicy {
    type Err = String;

    /// `top=5` / `top5` / `threshold=0.1`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(k) = lower.strip_prefix("top").map(|r| r.trim_start_matches('=')) {
            return k
                .parse::<usize>()
                .map(SelectionPolicy::TopN)
                .map_err(|_| format!("Invalid TopN count: '{}'", k));
        }
        if let Some(t) = lower.strip_prefix("threshold").map(|r| r.trim_start_matches('=')) {
            return t
                .parse::<f64>()
                .map(SelectionPolicy::Threshold)
                .map_err(|_| format!("Invalid threshold: '{}'", t));
        }
        Err(format!(
            "Unknown selection policy: '{}'. Use top=<k> or threshold=<value>.",
            s
        ))
    }
}
