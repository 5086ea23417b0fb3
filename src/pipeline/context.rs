//! Session state threaded through selection and training
//!
//! A training action runs these steps in order:
//! 1. Narrow the split to the selected features
//! 2. Correct class imbalance on the training partition (classification only)
//! 3. Optionally grid-search hyperparameters
//! 4. Score the chosen configuration under the validation plan
//! 5. Fit on the training partition and predict the test partition
//! 6. Compute metrics and register the result
//!
//! Configuration and empty-selection errors abort before step 6, so a failed
//! action never reaches the registry.

use indicatif::ProgressBar;
use log::{info, warn};
use serde::Serialize;

use super::ModelArtifact;
use crate::config::Settings;
use crate::data::{train_test_split, Dataset, FeatureSet, ProblemType, Split};
use crate::error::{Degradation, Result, SieveError};
use crate::estimator::{Estimator, ModelKind, ParamGrid, ParamSet};
use crate::metrics::{evaluate, ScoringMetric};
use crate::registry::{ModelRegistry, RankedResult, TrainedModelResult};
use crate::selection::{run_pipeline, PipelineOutcome, PipelineRequest};
use crate::validation::{
    correct_imbalance, CorrectionOutcome, FoldScores, GridSearch, Resampler, SearchSummary,
    ValidationPlan,
};

/// What to train and how.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub model: ModelKind,
    /// Fixed hyperparameters applied before any search
    pub params: ParamSet,
    /// Search this grid; `None` trains with `params` only
    pub grid: Option<ParamGrid>,
    /// Resampler for imbalanced classification targets
    pub imbalance: Option<Resampler>,
    /// Cross-validation score; defaults to F1 (classification) or R² (regression)
    pub metric: Option<ScoringMetric>,
}

impl TrainingRequest {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            params: ParamSet::new(),
            grid: None,
            imbalance: None,
            metric: None,
        }
    }

    /// Search the model's default grid
    pub fn with_default_grid(mut self) -> Self {
        self.grid = Some(self.model.default_grid());
        self
    }

    pub fn with_imbalance(mut self, resampler: Resampler) -> Self {
        self.imbalance = Some(resampler);
        self
    }
}

/// Everything one training action produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub problem_type: ProblemType,
    pub features: FeatureSet,
    pub plan: ValidationPlan,
    pub metric: ScoringMetric,
    /// `None` when the validation step could not run
    pub fold_scores: Option<FoldScores>,
    pub correction: Option<CorrectionOutcome>,
    pub search: Option<SearchSummary>,
    /// Test-partition metrics, as registered
    pub metrics: std::collections::BTreeMap<String, f64>,
    pub degradations: Vec<Degradation>,
    /// Position of the result in the registry
    pub registry_index: usize,
}

/// Dataset, settings, split, validation plan, last selection and registry.
pub struct PipelineContext {
    dataset: Dataset,
    settings: Settings,
    split: Split,
    plan: ValidationPlan,
    outcome: Option<PipelineOutcome>,
    registry: ModelRegistry,
}

impl PipelineContext {
    /// Start a session with a fresh split and hold-out validation.
    pub fn new(dataset: Dataset, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let split = make_split(&dataset, settings.test_fraction, settings.seed)?;
        Ok(Self {
            dataset,
            settings,
            split,
            plan: ValidationPlan::HoldOut,
            outcome: None,
            registry: ModelRegistry::new(),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    pub fn plan(&self) -> ValidationPlan {
        self.plan
    }

    pub fn outcome(&self) -> Option<&PipelineOutcome> {
        self.outcome.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Features training uses: the last selection's output, or every feature.
    pub fn active_features(&self) -> FeatureSet {
        match &self.outcome {
            Some(outcome) => outcome.final_features.clone(),
            None => self.dataset.feature_set(),
        }
    }

    pub fn set_plan(&mut self, plan: ValidationPlan) -> Result<()> {
        plan.validate(self.dataset.problem_type())?;
        self.plan = plan;
        Ok(())
    }

    /// Run the two-phase selection and keep its outcome.
    ///
    /// The new outcome replaces the previous one. The previous outcome is
    /// discarded before the run starts, so after a failed run no selection is
    /// active and training falls back to every feature.
    pub fn run_selection(&mut self, request: &PipelineRequest) -> Result<&PipelineOutcome> {
        self.outcome = None;
        let outcome = run_pipeline(&self.dataset, request, &self.settings.scorer_options())?;
        Ok(self.outcome.insert(outcome))
    }

    /// Regenerate the split with a new test fraction and seed.
    pub fn resplit(&mut self, test_fraction: f64, seed: u64) -> Result<()> {
        self.split = make_split(&self.dataset, test_fraction, seed)?;
        self.settings.test_fraction = test_fraction;
        self.settings.seed = seed;
        Ok(())
    }

    pub fn train(&mut self, request: &TrainingRequest) -> Result<TrainingReport> {
        self.train_with_progress(request, None)
    }

    /// Train one model on the active features and register the result.
    ///
    /// # Errors
    /// * `Configuration` - model/problem mismatch, bad parameters or metric
    /// * `EmptySelection` - the active feature set is empty
    /// * `Fit` / `Data` from the final fit; recoverable failures in imbalance
    ///   correction, grid search and validation are degradations instead
    pub fn train_with_progress(
        &mut self,
        request: &TrainingRequest,
        progress: Option<&ProgressBar>,
    ) -> Result<TrainingReport> {
        let problem = self.dataset.problem_type();
        if !request.model.supports(problem) {
            return Err(SieveError::config(format!(
                "{} does not support {}",
                request.model, problem
            )));
        }
        let metric = request.metric.unwrap_or_else(|| ScoringMetric::default_for(problem));
        if metric.problem_type() != problem {
            return Err(SieveError::config(format!(
                "Metric {} does not apply to {}",
                metric, problem
            )));
        }
        self.plan.validate(problem)?;

        let features = self.active_features();
        if features.is_empty() {
            return Err(SieveError::empty("training input"));
        }
        let template = request
            .model
            .build(self.settings.seed)
            .with_params(&request.params)?;
        let mut degradations = Vec::new();

        // Step 1: narrow the split
        let split = self.split.select(&features)?;

        // Step 2: imbalance correction
        let (split, correction) = match request.imbalance {
            Some(resampler) if problem == ProblemType::Classification => {
                let config = self.settings.imbalance(resampler);
                config.validate()?;
                let (corrected, outcome) = correct_imbalance(&split, problem, &config);
                if let CorrectionOutcome::Failed { reason, .. } = &outcome {
                    degradations.push(Degradation::new("imbalance", reason.clone()));
                }
                (corrected, Some(outcome))
            }
            Some(_) => {
                info!("Imbalance correction skipped for {}", problem);
                (split, Some(CorrectionOutcome::NotApplicable))
            }
            None => (split, None),
        };

        // Step 3: grid search
        let limits = self.settings.fold_limits();
        let mut tuned = None;
        let mut search = None;
        if let Some(grid) = &request.grid {
            let mut searcher = GridSearch::new(grid, self.plan, metric);
            searcher.limits = limits;
            if let ValidationPlan::HoldOut = self.plan {
                searcher.plan = ValidationPlan::k_fold(self.settings.search_folds);
            }
            if let Some(pb) = progress {
                searcher = searcher.with_progress(pb);
            }
            match searcher.run(&template, &split, problem) {
                Ok((model, summary)) => {
                    tuned = Some((template.clone().with_params(&summary.best_params)?, model));
                    search = Some(summary);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Grid search for {} failed: {}", request.model, e);
                    degradations.push(Degradation::new(
                        "grid_search",
                        format!("{}; trained with fixed parameters", e),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        let (chosen, fitted) = match tuned {
            Some((chosen, fitted)) => (chosen, Some(fitted)),
            None => (template, None),
        };

        // Step 4: validation plan
        let fold_scores = match self.plan.evaluate(&chosen, &split, problem, metric, &limits) {
            Ok(scores) => Some(scores),
            Err(e) if e.is_recoverable() => {
                warn!("Validation of {} failed: {}", request.model, e);
                degradations.push(Degradation::new("validation", e.to_string()));
                None
            }
            Err(e) => return Err(e),
        };

        // Step 5: final fit and test predictions
        let model = match fitted {
            Some(model) => model,
            None => {
                let mut model = chosen;
                model.fit(&split.x_train, &split.y_train, problem)?;
                model
            }
        };
        let y_pred = model.predict(&split.x_test)?;

        // Step 6: metrics and registration
        let metrics = evaluate(problem, &split.y_test, &y_pred)?;
        let artifact = ModelArtifact {
            model,
            features: features.clone(),
            problem_type: problem,
            class_labels: self.dataset.target().classes.clone().unwrap_or_default(),
        };
        let model_name = request.model.display_name().to_string();
        self.registry.register(TrainedModelResult {
            model_name: model_name.clone(),
            problem_type: problem,
            metrics: metrics.clone(),
            artifact,
            y_test: split.y_test.clone(),
            y_pred,
        });

        Ok(TrainingReport {
            model_name,
            problem_type: problem,
            features,
            plan: self.plan,
            metric,
            fold_scores,
            correction,
            search,
            metrics,
            degradations,
            registry_index: self.registry.len() - 1,
        })
    }

    /// Registry results ranked for this dataset's problem type.
    pub fn leaderboard(&self, metric: Option<ScoringMetric>) -> Vec<RankedResult<'_>> {
        self.registry.rank(self.dataset.problem_type(), metric)
    }

    pub fn reset_registry(&mut self) {
        self.registry.reset();
    }
}

/// Stratify classification splits so every class lands on both sides.
fn make_split(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<Split> {
    let stratify = dataset.problem_type() == ProblemType::Classification;
    train_test_split(dataset.features(), dataset.y(), test_fraction, seed, stratify)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMatrix;
    use crate::selection::{PhaseMethod, ScorerKind, SelectionPolicy, SelectionStage};

    fn dataset() -> Dataset {
        let n = 60;
        let signal: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..n).map(|i| ((i * 17) % 11) as f64).collect();
        let other: Vec<f64> = (0..n).map(|i| ((i * 5) % 3) as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| if i < 30 { 0.0 } else { 1.0 }).collect();
        let x = FeatureMatrix::new(
            vec!["signal".into(), "noise".into(), "other".into()],
            vec![signal, noise, other],
        )
        .unwrap();
        Dataset::from_parts(x, "y", y, Some(ProblemType::Classification)).unwrap()
    }

    #[test]
    fn test_train_registers_result() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        let report = ctx.train(&TrainingRequest::new(ModelKind::DecisionTree)).unwrap();
        assert_eq!(ctx.registry().len(), 1);
        assert_eq!(report.registry_index, 0);
        assert!(report.metrics.contains_key("f1_weighted"));
        assert_eq!(report.features.len(), 3);
    }

    #[test]
    fn test_training_uses_selected_features() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(1));
        ctx.run_selection(&PipelineRequest::single(PhaseMethod::Single { stage }))
            .unwrap();
        let report = ctx.train(&TrainingRequest::new(ModelKind::LogisticRegression)).unwrap();
        assert_eq!(report.features, FeatureSet::new(["signal"]));
        assert_eq!(
            ctx.registry().results()[0].artifact.features,
            FeatureSet::new(["signal"])
        );
    }

    #[test]
    fn test_configuration_error_leaves_registry_empty() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        let err = ctx
            .train(&TrainingRequest::new(ModelKind::LinearRegression))
            .unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
        assert!(ctx.registry().is_empty());
    }

    #[test]
    fn test_regression_metric_rejected_for_classification() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        let mut request = TrainingRequest::new(ModelKind::DecisionTree);
        request.metric = Some(ScoringMetric::R2);
        assert!(ctx.train(&request).is_err());
        assert!(ctx.registry().is_empty());
    }

    #[test]
    fn test_folding_plan_reports_fold_scores() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        ctx.set_plan(ValidationPlan::stratified(4, 1)).unwrap();
        let report = ctx.train(&TrainingRequest::new(ModelKind::KNearestNeighbors)).unwrap();
        let folds = report.fold_scores.unwrap();
        assert_eq!(folds.scores.len(), 4);
    }

    #[test]
    fn test_resplit_and_reset() {
        let mut ctx = PipelineContext::new(dataset(), Settings::default()).unwrap();
        ctx.train(&TrainingRequest::new(ModelKind::DecisionTree)).unwrap();
        ctx.resplit(0.5, 3).unwrap();
        assert_eq!(ctx.split().y_test.len(), 30);
        ctx.reset_registry();
        assert!(ctx.leaderboard(None).is_empty());
    }
}
