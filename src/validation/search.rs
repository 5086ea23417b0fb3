//! Exhaustive hyperparameter search
//!
//! Algorithm:
//! 1. Enumerate the grid (last axis fastest)
//! 2. Cross-validate every point in parallel on the training partition
//! 3. Pick the highest mean score; ties go to the earliest point
//! 4. Refit the winning point on the whole training partition

use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::strategy::{FoldLimits, FoldScores, ValidationPlan};
use crate::data::{ProblemType, Split};
use crate::error::{Result, SieveError};
use crate::estimator::{Estimator, Model, ParamGrid, ParamSet};
use crate::metrics::ScoringMetric;

/// Folds used when grid search is asked to run under hold-out
pub const DEFAULT_SEARCH_FOLDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPointResult {
    pub params: ParamSet,
    /// `None` when the point failed to fit
    pub scores: Option<FoldScores>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub best_params: ParamSet,
    pub best_score: f64,
    pub metric: ScoringMetric,
    pub plan_used: ValidationPlan,
    pub results: Vec<GridPointResult>,
}

impl SearchSummary {
    pub fn failed_points(&self) -> usize {
        self.results.iter().filter(|r| r.scores.is_none()).count()
    }
}

pub struct GridSearch<'a> {
    pub grid: &'a ParamGrid,
    pub plan: ValidationPlan,
    pub metric: ScoringMetric,
    pub limits: FoldLimits,
    pub progress: Option<&'a ProgressBar>,
}

impl<'a> GridSearch<'a> {
    pub fn new(grid: &'a ParamGrid, plan: ValidationPlan, metric: ScoringMetric) -> Self {
        Self {
            grid,
            plan,
            metric,
            limits: FoldLimits::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Hold-out has no inner folds; search falls back to k-fold on the
    /// training partition.
    pub fn effective_plan(&self) -> ValidationPlan {
        match self.plan {
            ValidationPlan::HoldOut => ValidationPlan::k_fold(DEFAULT_SEARCH_FOLDS),
            other => other,
        }
    }

    /// Search the grid for `template` and return the refitted best model.
    ///
    /// # Errors
    /// * `Configuration` for an empty grid, an unknown parameter name, or a
    ///   plan the problem type does not allow
    /// * `Fit` when every grid point failed
    pub fn run(&self, template: &Model, split: &Split, problem: ProblemType) -> Result<(Model, SearchSummary)> {
        let points = self.grid.combinations();
        if points.is_empty() {
            return Err(SieveError::config(format!(
                "Parameter grid for {} is empty",
                template.name()
            )));
        }
        let plan = self.effective_plan();
        plan.validate(problem)?;

        // Bad parameter names are configuration mistakes, caught before fitting
        let candidates: Vec<Model> = points
            .iter()
            .map(|p| template.clone().with_params(p))
            .collect::<Result<_>>()?;

        if let Some(pb) = self.progress {
            pb.set_length(points.len() as u64);
        }

        let outcomes: Vec<Result<FoldScores>> = candidates
            .par_iter()
            .map(|candidate| {
                let outcome = plan.cross_validate(
                    candidate,
                    &split.x_train,
                    &split.y_train,
                    problem,
                    self.metric,
                    &self.limits,
                );
                if let Some(pb) = self.progress {
                    pb.inc(1);
                }
                outcome
            })
            .collect();

        let mut results = Vec::with_capacity(points.len());
        let mut best: Option<(usize, f64)> = None;
        for (i, (params, outcome)) in points.into_iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(scores) => {
                    if !scores.mean.is_finite() {
                        warn!("Grid point {} for {} scored {}", i, template.name(), scores.mean);
                    }
                    if is_better(scores.mean, best.map(|(_, s)| s)) {
                        best = Some((i, scores.mean));
                    }
                    results.push(GridPointResult {
                        params,
                        scores: Some(scores),
                        error: None,
                    });
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Grid point {} for {} failed: {}", i, template.name(), e);
                    results.push(GridPointResult {
                        params,
                        scores: None,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let (best_index, best_score) = best.ok_or_else(|| {
            SieveError::fit(format!(
                "None of {} grid points produced a finite score for {}",
                results.len(),
                template.name()
            ))
        })?;

        let mut model = candidates[best_index].clone();
        model.fit(&split.x_train, &split.y_train, problem)?;

        let best_params = results[best_index].params.clone();
        info!(
            "{}: best {} = {:.4} with {}",
            template.name(),
            self.metric,
            best_score,
            best_params
        );

        Ok((
            model,
            SearchSummary {
                best_params,
                best_score,
                metric: self.metric,
                plan_used: plan,
                results,
            },
        ))
    }
}

/// Strictly greater finite scores win, so the earliest point keeps ties and
/// a NaN or infinite mean never becomes the best.
fn is_better(mean: f64, best: Option<f64>) -> bool {
    mean.is_finite() && best.map_or(true, |b| mean > b)
}
