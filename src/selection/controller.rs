//! Two-phase selection controller
//!
//! Phase 1 runs over every feature. Phase 2, when enabled, runs over Phase 1's
//! output only. The final feature set is Phase 2's output when it ran and kept
//! something, otherwise Phase 1's.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::cascade::{run_cascade, CascadeConfig, CascadeReport, StageCount};
use super::ensemble::{run_ensemble, CombineMode, EnsembleConfig, EnsembleReport};
use super::scorer::ScorerOptions;
use super::stage::{SelectionResult, SelectionStage};
use crate::data::{Dataset, FeatureSet};
use crate::error::{Degradation, Result, SieveError};

/// What a phase does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PhaseMethod {
    /// Caller-chosen features; all of them must lie in the phase's domain
    Manual { features: FeatureSet },
    Single { stage: SelectionStage },
    Cascade { config: CascadeConfig },
    Ensemble { config: EnsembleConfig },
}

impl PhaseMethod {
    /// Checks that do not depend on the domain
    pub fn validate(&self) -> Result<()> {
        match self {
            PhaseMethod::Manual { features } if features.is_empty() => {
                Err(SieveError::config("Manual selection lists no features"))
            }
            PhaseMethod::Manual { .. } => Ok(()),
            PhaseMethod::Single { stage } => stage.validate(),
            PhaseMethod::Cascade { config } => config.validate(),
            PhaseMethod::Ensemble { config } => config.validate(),
        }
    }

    /// Checks against a known domain size, before anything is fitted
    fn validate_for(&self, domain: &FeatureSet) -> Result<()> {
        self.validate()?;
        match self {
            PhaseMethod::Manual { features } => {
                let outside = features.outside_of(domain);
                if !outside.is_empty() {
                    return Err(SieveError::config(format!(
                        "Manual selection names features outside the candidate domain: {}",
                        outside.join(", ")
                    )));
                }
                Ok(())
            }
            PhaseMethod::Single { stage } => stage.policy.validate(domain.len()),
            PhaseMethod::Ensemble { config } => {
                config.first.policy.validate(domain.len())?;
                config.second.policy.validate(domain.len())
            }
            PhaseMethod::Cascade { .. } => Ok(()),
        }
    }

    /// Parse a method description.
    ///
    /// * `manual:a,b,c`
    /// * `<scorer>:<policy>` such as `mi:top=5`
    /// * `cascade` (fractions from `defaults`) or `cascade:<p_a>,<p_b>,<final_count>`
    /// * `ensemble:<intersection|union>:<stage>+<stage>`
    pub fn parse(s: &str, defaults: &CascadeConfig) -> std::result::Result<Self, String> {
        let s = s.trim();
        if let Some(list) = s.strip_prefix("manual:") {
            let features = FeatureSet::new(list.split(',').map(str::trim).filter(|f| !f.is_empty()));
            return Ok(PhaseMethod::Manual { features });
        }
        if s == "cascade" {
            return Ok(PhaseMethod::Cascade { config: *defaults });
        }
        if let Some(args) = s.strip_prefix("cascade:") {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(format!("Expected cascade:<p_a>,<p_b>,<final_count>, got '{}'", s));
            }
            let p_a = parts[0].parse().map_err(|_| format!("Invalid p_a: '{}'", parts[0]))?;
            let p_b = parts[1].parse().map_err(|_| format!("Invalid p_b: '{}'", parts[1]))?;
            let final_count = parts[2]
                .parse()
                .map_err(|_| format!("Invalid final_count: '{}'", parts[2]))?;
            return Ok(PhaseMethod::Cascade {
                config: CascadeConfig {
                    p_a,
                    p_b,
                    final_count,
                },
            });
        }
        if let Some(args) = s.strip_prefix("ensemble:") {
            let (mode, stages) = args
                .split_once(':')
                .ok_or_else(|| format!("Expected ensemble:<mode>:<stage>+<stage>, got '{}'", s))?;
            let (first, second) = stages
                .split_once('+')
                .ok_or_else(|| format!("Ensemble needs two stages joined by '+', got '{}'", stages))?;
            return Ok(PhaseMethod::Ensemble {
                config: EnsembleConfig {
                    first: first.parse()?,
                    second: second.parse()?,
                    mode: mode.parse::<CombineMode>()?,
                },
            });
        }
        Ok(PhaseMethod::Single { stage: s.parse()? })
    }
}

impl std::fmt::Display for PhaseMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseMethod::Manual { features } => write!(f, "manual ({} features)", features.len()),
            PhaseMethod::Single { stage } => write!(f, "{}", stage),
            PhaseMethod::Cascade { config } => write!(
                f,
                "cascade (p_a={}, p_b={}, final={})",
                config.p_a, config.p_b, config.final_count
            ),
            PhaseMethod::Ensemble { config } => {
                write!(f, "ensemble {} of {} and {}", config.mode, config.first, config.second)
            }
        }
    }
}

/// Method-specific record of a phase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseDetail {
    Manual,
    Single { result: SelectionResult },
    Cascade { report: CascadeReport },
    Ensemble { report: EnsembleReport },
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseOutcome {
    pub method: PhaseMethod,
    pub input_domain: FeatureSet,
    pub retained: FeatureSet,
    pub detail: PhaseDetail,
}

impl PhaseOutcome {
    /// Retained count per step, starting with the input size
    pub fn stage_counts(&self) -> Vec<StageCount> {
        let input = StageCount {
            stage: "input".to_string(),
            retained: self.input_domain.len(),
        };
        match &self.detail {
            PhaseDetail::Cascade { report } => report.counts.clone(),
            PhaseDetail::Manual => vec![
                input,
                StageCount {
                    stage: "manual".to_string(),
                    retained: self.retained.len(),
                },
            ],
            PhaseDetail::Single { result } => vec![
                input,
                StageCount {
                    stage: result.method.to_string(),
                    retained: self.retained.len(),
                },
            ],
            PhaseDetail::Ensemble { report } => vec![
                input,
                StageCount {
                    stage: side_label(&self.method, true),
                    retained: report.first_count(),
                },
                StageCount {
                    stage: side_label(&self.method, false),
                    retained: report.second_count(),
                },
                StageCount {
                    stage: report.mode.to_string(),
                    retained: self.retained.len(),
                },
            ],
        }
    }
}

fn side_label(method: &PhaseMethod, first: bool) -> String {
    match method {
        PhaseMethod::Ensemble { config } if first => config.first.to_string(),
        PhaseMethod::Ensemble { config } => config.second.to_string(),
        _ => "ensemble".to_string(),
    }
}

/// Input to one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub phase1: PhaseMethod,
    #[serde(default)]
    pub phase2: Option<PhaseMethod>,
}

impl PipelineRequest {
    pub fn single(phase1: PhaseMethod) -> Self {
        Self { phase1, phase2: None }
    }

    pub fn with_phase2(mut self, phase2: PhaseMethod) -> Self {
        self.phase2 = Some(phase2);
        self
    }
}

/// Result of a pipeline run; replaced wholesale by the next run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub phase1: PhaseOutcome,
    pub phase2: Option<PhaseOutcome>,
    pub final_features: FeatureSet,
    /// Fallbacks taken along the way (skipped cascade stage, failed Phase 2)
    pub degradations: Vec<Degradation>,
    /// Non-fatal notices such as an empty ensemble in Phase 2
    pub warnings: Vec<String>,
}

impl PipelineOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

fn run_phase(
    dataset: &Dataset,
    domain: &FeatureSet,
    method: &PhaseMethod,
    options: &ScorerOptions,
) -> Result<PhaseOutcome> {
    method.validate_for(domain)?;

    let (retained, detail) = match method {
        PhaseMethod::Manual { features } => (features.ordered_by(domain), PhaseDetail::Manual),
        PhaseMethod::Single { stage } => {
            let result = stage.run(dataset, domain, options)?;
            (result.retained.clone(), PhaseDetail::Single { result })
        }
        PhaseMethod::Cascade { config } => {
            let report = run_cascade(dataset, domain, config, options)?;
            (report.retained.clone(), PhaseDetail::Cascade { report })
        }
        PhaseMethod::Ensemble { config } => {
            let report = run_ensemble(dataset, domain, config, options)?;
            (report.retained.clone(), PhaseDetail::Ensemble { report })
        }
    };

    Ok(PhaseOutcome {
        method: method.clone(),
        input_domain: domain.clone(),
        retained,
        detail,
    })
}

fn collect_notes(phase: &PhaseOutcome, degradations: &mut Vec<Degradation>, warnings: &mut Vec<String>) {
    match &phase.detail {
        PhaseDetail::Cascade { report } => degradations.extend(report.degradation.clone()),
        PhaseDetail::Ensemble { report } => {
            degradations.extend(report.degradations.iter().cloned());
            warnings.extend(report.warning.clone());
        }
        _ => {}
    }
}

/// Run Phase 1 and, if requested, Phase 2.
///
/// # Errors
/// * `Configuration` - invalid method parameters, or Phase 2 asking for more
///   features (or other features) than Phase 1 kept; raised before fitting
/// * `EmptySelection` - Phase 1 kept nothing
/// * `Data` / `Fit` from Phase 1 scorers. The same errors in Phase 2 fall
///   back to Phase 1's output and are recorded as degradations.
pub fn run_pipeline(dataset: &Dataset, request: &PipelineRequest, options: &ScorerOptions) -> Result<PipelineOutcome> {
    request.phase1.validate()?;
    if let Some(phase2) = &request.phase2 {
        phase2.validate()?;
    }

    let mut degradations = Vec::new();
    let mut warnings = Vec::new();

    // Step 1: Phase 1 over the full feature set
    let domain = dataset.feature_set();
    let phase1 = run_phase(dataset, &domain, &request.phase1, options)?;
    if phase1.retained.is_empty() {
        return Err(SieveError::empty("phase 1"));
    }
    collect_notes(&phase1, &mut degradations, &mut warnings);
    info!(
        "Phase 1 ({}): {} -> {} features",
        request.phase1,
        domain.len(),
        phase1.retained.len()
    );

    // Step 2: optional Phase 2 over Phase 1's output
    let phase2 = match &request.phase2 {
        None => None,
        Some(method) => match run_phase(dataset, &phase1.retained, method, options) {
            Ok(outcome) => {
                collect_notes(&outcome, &mut degradations, &mut warnings);
                info!(
                    "Phase 2 ({}): {} -> {} features",
                    method,
                    phase1.retained.len(),
                    outcome.retained.len()
                );
                Some(outcome)
            }
            Err(e) if e.is_recoverable() => {
                let degradation = Degradation::new("phase 2", format!("{}; using phase 1 output", e));
                warn!("{}", degradation);
                degradations.push(degradation);
                None
            }
            Err(e) => return Err(e),
        },
    };

    // Step 3: terminal output
    let final_features = match &phase2 {
        Some(p2) if !p2.retained.is_empty() => p2.retained.clone(),
        Some(_) => {
            let message = "phase 2 retained no features; using phase 1 output".to_string();
            warn!("{}", message);
            warnings.push(message);
            phase1.retained.clone()
        }
        None => phase1.retained.clone(),
    };

    if !final_features.is_subset_of(&phase1.retained) {
        return Err(SieveError::config("Phase 2 selected features outside phase 1's output"));
    }

    Ok(PipelineOutcome {
        phase1,
        phase2,
        final_features,
        degradations,
        warnings,
    })
}
