//! Two independent selections merged by set intersection or union

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::scorer::ScorerOptions;
use super::stage::{SelectionResult, SelectionStage};
use crate::data::{Dataset, FeatureSet};
use crate::error::{Degradation, Result, SieveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    Intersection,
    Union,
}

impl CombineMode {
    pub fn combine(&self, a: &FeatureSet, b: &FeatureSet) -> FeatureSet {
        match self {
            CombineMode::Intersection => a.intersection(b),
            CombineMode::Union => a.union(b),
        }
    }
}

impl std::fmt::Display for CombineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombineMode::Intersection => write!(f, "intersection"),
            CombineMode::Union => write!(f, "union"),
        }
    }
}

impl std::str::FromStr for CombineMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intersection" | "and" | "both" => Ok(CombineMode::Intersection),
            "union" | "or" | "either" => Ok(CombineMode::Union),
            _ => Err(format!(
                "Unknown combine mode: '{}'. Use 'intersection' or 'union'.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub first: SelectionStage,
    pub second: SelectionStage,
    pub mode: CombineMode,
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<()> {
        self.first.validate()?;
        self.second.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleReport {
    pub mode: CombineMode,
    /// `None` when that side failed recoverably and counted as empty
    pub first: Option<SelectionResult>,
    pub second: Option<SelectionResult>,
    pub retained: FeatureSet,
    /// Set when the combined set came out empty
    pub warning: Option<String>,
    /// One entry per side that failed recoverably
    pub degradations: Vec<Degradation>,
}

impl EnsembleReport {
    pub fn first_count(&self) -> usize {
        self.first.as_ref().map_or(0, |r| r.retained.len())
    }

    pub fn second_count(&self) -> usize {
        self.second.as_ref().map_or(0, |r| r.retained.len())
    }
}

/// Run one side; a recoverable failure becomes an empty side plus a degradation.
fn run_side(
    stage: &SelectionStage,
    dataset: &Dataset,
    domain: &FeatureSet,
    options: &ScorerOptions,
    degradations: &mut Vec<Degradation>,
) -> Result<Option<SelectionResult>> {
    match stage.run(dataset, domain, options) {
        Ok(result) => Ok(Some(result)),
        Err(e) if e.is_recoverable() => {
            let degradation = Degradation::new(
                "ensemble",
                format!("{} failed: {}; counted as empty", stage, e),
            );
            warn!("{}", degradation);
            degradations.push(degradation);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Run both stages over the same domain and combine their retained sets.
///
/// Either side may come back empty, or fail with a `Data`/`Fit` error that is
/// recorded as a degradation and treated as an empty side. An empty
/// combination is reported as a warning on the report rather than an error.
pub fn run_ensemble(
    dataset: &Dataset,
    domain: &FeatureSet,
    config: &EnsembleConfig,
    options: &ScorerOptions,
) -> Result<EnsembleReport> {
    config.validate()?;
    // Both policies must fit the domain before either scorer is fitted
    config.first.policy.validate(domain.len())?;
    config.second.policy.validate(domain.len())?;
    if domain.is_empty() {
        return Err(SieveError::empty("ensemble input"));
    }

    let mut degradations = Vec::new();
    let first = run_side(&config.first, dataset, domain, options, &mut degradations)?;
    let second = run_side(&config.second, dataset, domain, options, &mut degradations)?;
    let empty = FeatureSet::empty();
    let retained = config.mode.combine(
        first.as_ref().map_or(&empty, |r| &r.retained),
        second.as_ref().map_or(&empty, |r| &r.retained),
    );

    let warning = if retained.is_empty() {
        let message = format!(
            "{} of {} ({}) and {} ({}) is empty",
            config.mode,
            config.first,
            first.as_ref().map_or(0, |r| r.retained.len()),
            config.second,
            second.as_ref().map_or(0, |r| r.retained.len())
        );
        warn!("Ensemble selection: {}", message);
        Some(message)
    } else {
        info!(
            "Ensemble {}: {} + {} -> {} features",
            config.mode,
            first.as_ref().map_or(0, |r| r.retained.len()),
            second.as_ref().map_or(0, |r| r.retained.len()),
            retained.len()
        );
        None
    };

    Ok(EnsembleReport {
        mode: config.mode,
        first,
        second,
        retained,
        warning,
        degradations,
    })
}
