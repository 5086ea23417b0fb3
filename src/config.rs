//! Run settings with defaults, loaded from JSON

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SieveError;
use crate::selection::{CascadeConfig, ScorerOptions};
use crate::validation::{FoldLimits, ImbalanceConfig, Resampler};

/// Every tunable of a run.
///
/// Keys missing from a settings file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stage A keep fraction of the cascade
    pub p_a: f64,
    /// Stage B keep fraction of the cascade
    pub p_b: f64,
    /// Stage C target count of the cascade
    pub final_count: usize,
    /// Correct imbalance above this max/min class count ratio
    pub imbalance_threshold: f64,
    pub smote_neighbors: usize,
    /// Leave-p-out: largest p
    pub max_p: usize,
    /// Leave-p-out: largest number of folds
    pub max_combinations: u64,
    /// Folds used by grid search when the plan is hold-out
    pub search_folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub mi_bins: usize,
    pub rfe_step: usize,
    /// Trees fitted by the importance and RFE-forest scorers
    pub scorer_estimators: usize,
    pub show_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            p_a: 0.5,
            p_b: 0.5,
            final_count: 5,
            imbalance_threshold: 1.5,
            smote_neighbors: 5,
            max_p: 5,
            max_combinations: 10_000,
            search_folds: 5,
            test_fraction: 0.2,
            seed: 42,
            mi_bins: 10,
            rfe_step: 1,
            scorer_estimators: 100,
            show_progress: true,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, value) in [("p_a", self.p_a), ("p_b", self.p_b)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(SieveError::config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(SieveError::config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(self.imbalance_threshold >= 1.0) {
            return Err(SieveError::config(format!(
                "imbalance_threshold must be at least 1.0, got {}",
                self.imbalance_threshold
            )));
        }
        let positive = [
            ("final_count", self.final_count),
            ("smote_neighbors", self.smote_neighbors),
            ("max_p", self.max_p),
            ("mi_bins", self.mi_bins),
            ("rfe_step", self.rfe_step),
            ("scorer_estimators", self.scorer_estimators),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SieveError::config(format!("{} must be at least 1", name)));
            }
        }
        if self.search_folds < 2 {
            return Err(SieveError::config(format!(
                "search_folds must be at least 2, got {}",
                self.search_folds
            )));
        }
        Ok(())
    }

    pub fn cascade(&self) -> CascadeConfig {
        CascadeConfig {
            p_a: self.p_a,
            p_b: self.p_b,
            final_count: self.final_count,
        }
    }

    pub fn scorer_options(&self) -> ScorerOptions {
        ScorerOptions {
            seed: self.seed,
            mi_bins: self.mi_bins,
            rfe_step: self.rfe_step,
            n_estimators: self.scorer_estimators,
        }
    }

    pub fn fold_limits(&self) -> FoldLimits {
        FoldLimits {
            max_p: self.max_p,
            max_combinations: self.max_combinations,
        }
    }

    /// Imbalance configuration for `resampler`, with SMOTE variants using the
    /// configured neighbour count.
    pub fn imbalance(&self, resampler: Resampler) -> ImbalanceConfig {
        let k = self.smote_neighbors;
        let resampler = match resampler {
            Resampler::Smote { .. } => Resampler::Smote { k },
            Resampler::SmoteEnn { .. } => Resampler::SmoteEnn { k },
            Resampler::SmoteTomek { .. } => Resampler::SmoteTomek { k },
            other => other,
        };
        ImbalanceConfig {
            resampler,
            threshold: self.imbalance_threshold,
            seed: self.seed,
        }
    }
}
