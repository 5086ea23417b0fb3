//! One scorer plus one policy over a candidate domain

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::policy::SelectionPolicy;
use super::scorer::{ScoreTable, ScorerKind, ScorerOptions};
use crate::data::{Dataset, FeatureSet};
use crate::error::{Result, SieveError};

/// Record of a single stage run. Never modified after it is produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub input_domain: FeatureSet,
    pub method: ScorerKind,
    pub retained: FeatureSet,
    pub scores: ScoreTable,
}

impl SelectionResult {
    /// Fail with `EmptySelection` naming `stage` if nothing was retained.
    pub fn require_features(&self, stage: &str) -> Result<()> {
        if self.retained.is_empty() {
            return Err(SieveError::empty(stage));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionStage {
    pub scorer: ScorerKind,
    pub policy: SelectionPolicy,
}

impl SelectionStage {
    pub fn new(scorer: ScorerKind, policy: SelectionPolicy) -> Self {
        Self { scorer, policy }
    }

    /// Parameter checks that do not depend on the data
    pub fn validate(&self) -> Result<()> {
        match (&self.scorer, self.policy) {
            (_, SelectionPolicy::TopN(0)) => Err(SieveError::config("TopN needs k >= 1")),
            (ScorerKind::L1 { alpha }, _) if *alpha < 0.0 => {
                Err(SieveError::config("L1 alpha must be non-negative"))
            }
            (ScorerKind::Rfe { n_features: Some(0), .. }, _) => {
                Err(SieveError::config("RFE must keep at least one feature"))
            }
            _ => Ok(()),
        }
    }

    /// Score `domain` and apply the policy.
    ///
    /// The policy is checked against the domain size before anything is
    /// fitted. An RFE scorer without an explicit count eliminates down to the
    /// TopN `k`. The result may be empty; callers decide whether that is fatal.
    pub fn run(&self, dataset: &Dataset, domain: &FeatureSet, options: &ScorerOptions) -> Result<SelectionResult> {
        self.validate()?;
        self.policy.validate(domain.len())?;

        let scorer = match (&self.scorer, self.policy) {
            (ScorerKind::Rfe { n_features: None, base }, SelectionPolicy::TopN(k)) => ScorerKind::Rfe {
                n_features: Some(k),
                base: *base,
            },
            (other, _) => other.clone(),
        };

        let scores = scorer.score(dataset, domain, options)?;
        let mut retained = self.policy.select(&scores);
        if scorer.drops_zero_scores() {
            retained = retained
                .iter()
                .filter(|f| scores.get(f).map_or(false, |s| s != 0.0))
                .cloned()
                .collect();
        }

        debug!(
            "Stage {} ({}): {} -> {} features",
            scorer,
            self.policy,
            domain.len(),
            retained.len()
        );
        if retained.is_empty() {
            warn!("Stage {} ({}) retained no features", scorer, self.policy);
        }

        Ok(SelectionResult {
            input_domain: domain.clone(),
            method: scorer,
            retained,
            scores,
        })
    }
}

impl std::fmt::Display for SelectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scorer, self.policy)
    }
}

impl std::str::FromStr for SelectionStage {
    type Err = String;

    /// `<scorer>:<policy>`, e.g. `mi:top=5`, `corr:threshold=0.3`, `l1@0.05:top=10`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (scorer, policy) = s
            .split_once(':')
            .ok_or_else(|| format!("Expected <scorer>:<policy>, got '{}'", s))?;
        Ok(SelectionStage::new(scorer.parse()?, policy.parse()?))
    }
}
