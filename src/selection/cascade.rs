//! Fixed three-stage narrowing cascade
//!
//! 1. Stage A: mutual information, keep ceil(|input| × p_a)
//! 2. Stage B: random forest importance on A's output, keep ceil(|A| × p_b)
//! 3. Stage C: forest-wrapped RFE on B's output down to `final_count`
//!    (clamped to [2, |B|]); skipped when B retains fewer than 2 features

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::policy::SelectionPolicy;
use super::scorer::{RfeBase, ScorerKind, ScorerOptions};
use super::stage::{SelectionResult, SelectionStage};
use crate::data::{Dataset, FeatureSet};
use crate::error::{Degradation, Result, SieveError};

/// Wrapper elimination needs at least this many candidates
const MIN_RFE_CANDIDATES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Fraction of the input kept by Stage A
    pub p_a: f64,
    /// Fraction of Stage A's output kept by Stage B
    pub p_b: f64,
    /// Target count for Stage C
    pub final_count: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            p_a: 0.5,
            p_b: 0.5,
            final_count: 5,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("p_a", self.p_a), ("p_b", self.p_b)] {
            if !(p > 0.0 && p <= 1.0) {
                return Err(SieveError::config(format!(
                    "Cascade fraction {} must be in (0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.final_count == 0 {
            return Err(SieveError::config("Cascade final_count must be at least 1"));
        }
        Ok(())
    }
}

/// Retained count after one step of the cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub retained: usize,
}

/// Everything the cascade did, for auditing and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeReport {
    pub config: CascadeConfig,
    pub stages: Vec<SelectionResult>,
    /// Input size followed by each stage's retained size
    pub counts: Vec<StageCount>,
    pub retained: FeatureSet,
    /// Set when Stage C was skipped
    pub degradation: Option<Degradation>,
}

impl CascadeReport {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }

    /// Counts as a chain, e.g. `20 → 10 → 5 → 3`
    pub fn count_chain(&self) -> String {
        self.counts
            .iter()
            .map(|c| c.retained.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

fn fraction_of(n: usize, p: f64) -> usize {
    ((n as f64 * p).ceil() as usize).clamp(1, n.max(1))
}

/// Run the cascade over `domain`.
///
/// # Arguments
/// * `dataset` - Data the scorers are fitted on
/// * `domain` - Input features (full feature set in Phase 1, Phase 1's output in Phase 2)
/// * `config` - Fractions and final count
/// * `options` - Scorer settings
pub fn run_cascade(
    dataset: &Dataset,
    domain: &FeatureSet,
    config: &CascadeConfig,
    options: &ScorerOptions,
) -> Result<CascadeReport> {
    config.validate()?;
    if domain.is_empty() {
        return Err(SieveError::empty("cascade input"));
    }

    let mut counts = vec![StageCount {
        stage: "input".to_string(),
        retained: domain.len(),
    }];
    let mut stages = Vec::with_capacity(3);

    // Stage A: mutual information
    let stage_a = SelectionStage::new(
        ScorerKind::MutualInformation,
        SelectionPolicy::TopN(fraction_of(domain.len(), config.p_a)),
    );
    let a = stage_a.run(dataset, domain, options)?;
    a.require_features("cascade stage A")?;
    counts.push(StageCount {
        stage: "A: mutual_information".to_string(),
        retained: a.retained.len(),
    });

    // Stage B: tree-ensemble importance on A's output
    let stage_b = SelectionStage::new(
        ScorerKind::TreeImportance,
        SelectionPolicy::TopN(fraction_of(a.retained.len(), config.p_b)),
    );
    let b = stage_b.run(dataset, &a.retained, options)?;
    b.require_features("cascade stage B")?;
    counts.push(StageCount {
        stage: "B: tree_importance".to_string(),
        retained: b.retained.len(),
    });

    let b_retained = b.retained.clone();
    stages.push(a);
    stages.push(b);

    // Stage C: forest-wrapped RFE, or pass B through
    let (retained, degradation) = if b_retained.len() < MIN_RFE_CANDIDATES {
        let degradation = Degradation::new(
            "cascade",
            format!(
                "stage C skipped: stage B retained {} feature(s), wrapper elimination needs {}",
                b_retained.len(),
                MIN_RFE_CANDIDATES
            ),
        );
        warn!("{}", degradation);
        (b_retained, Some(degradation))
    } else {
        let target = config
            .final_count
            .max(MIN_RFE_CANDIDATES)
            .min(b_retained.len());
        let stage_c = SelectionStage::new(
            ScorerKind::Rfe {
                n_features: Some(target),
                base: RfeBase::Forest,
            },
            SelectionPolicy::TopN(target),
        );
        let c = stage_c.run(dataset, &b_retained, options)?;
        c.require_features("cascade stage C")?;
        counts.push(StageCount {
            stage: "C: rfe_forest".to_string(),
            retained: c.retained.len(),
        });
        let retained = c.retained.clone();
        stages.push(c);
        (retained, None)
    };

    let report = CascadeReport {
        config: *config,
        stages,
        counts,
        retained,
        degradation,
    };
    info!("Cascade counts: {}", report.count_chain());
    Ok(report)
}
