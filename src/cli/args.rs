//! Command-line argument definitions using clap

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Settings;
use crate::data::ProblemType;
use crate::estimator::ModelKind;
use crate::metrics::ScoringMetric;
use crate::selection::{PhaseMethod, PipelineRequest};
use crate::validation::{Resampler, ValidationPlan};

/// Sieve - select features in stages, then train and rank models under a validation plan
#[derive(Parser, Debug)]
#[command(name = "sieve")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV or Parquet); must already be imputed
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target column name
    #[arg(short, long)]
    pub target: String,

    /// Problem type: "classification" or "regression". Inferred from the target when omitted.
    #[arg(long)]
    pub problem: Option<ProblemType>,

    /// Phase 1 method.
    /// Options: "cascade", "cascade:<p_a>,<p_b>,<n>", "manual:a,b,c",
    /// "<scorer>:<policy>" (e.g. "mi:top=5", "l1@0.05:threshold=0.01"),
    /// "ensemble:<intersection|union>:<stage>+<stage>"
    #[arg(long, default_value = "cascade")]
    pub phase1: String,

    /// Optional Phase 2 method, run over Phase 1's output (same options as --phase1)
    #[arg(long)]
    pub phase2: Option<String>,

    /// Validation plan: "holdout", "kfold[:k]", "stratified[:k]", "loo", "lpo:<p>"
    #[arg(long, default_value = "holdout")]
    pub validation: ValidationPlan,

    /// Resampler for imbalanced classification targets:
    /// "over", "under", "smote", "smote_enn", "smote_tomek"
    #[arg(long)]
    pub imbalance: Option<Resampler>,

    /// Models to train (comma-separated). Defaults to every model that supports the problem type.
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<ModelKind>,

    /// Grid-search each model over its default parameter grid
    #[arg(long, default_value = "false")]
    pub grid_search: bool,

    /// Cross-validation score (e.g. "f1", "accuracy", "r2", "rmse")
    #[arg(long)]
    pub metric: Option<ScoringMetric>,

    /// JSON settings file; explicit flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Share of rows held out for testing
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Random seed for splits, resampling and ensembles
    #[arg(long)]
    pub seed: Option<u64>,

    /// Imbalance ratio (max/min class count) above which correction runs
    #[arg(long)]
    pub imbalance_threshold: Option<f64>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the top-ranked model artifact (JSON) to this path
    #[arg(long)]
    pub save_model: Option<PathBuf>,

    /// Columns to drop before processing (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,

    /// Number of rows to use for schema inference (CSV only). Use 0 for a full scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Hide spinners and progress bars
    #[arg(long, default_value = "false")]
    pub no_progress: bool,
}

impl Cli {
    /// Settings file (or defaults) with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(fraction) = self.test_fraction {
            settings.test_fraction = fraction;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(threshold) = self.imbalance_threshold {
            settings.imbalance_threshold = threshold;
        }
        if self.no_progress {
            settings.show_progress = false;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    /// Selection request from `--phase1` / `--phase2`.
    pub fn pipeline_request(&self, settings: &Settings) -> Result<PipelineRequest> {
        let defaults = settings.cascade();
        let phase1 = PhaseMethod::parse(&self.phase1, &defaults)
            .map_err(|e| anyhow::anyhow!("Invalid --phase1: {}", e))?;
        let mut request = PipelineRequest::single(phase1);
        if let Some(phase2) = &self.phase2 {
            let phase2 = PhaseMethod::parse(phase2, &defaults)
                .map_err(|e| anyhow::anyhow!("Invalid --phase2: {}", e))?;
            request = request.with_phase2(phase2);
        }
        Ok(request)
    }

    /// Requested models, or every catalog model supporting `problem`.
    pub fn model_kinds(&self, problem: ProblemType) -> Vec<ModelKind> {
        if self.models.is_empty() {
            ModelKind::ALL
                .iter()
                .copied()
                .filter(|m| m.supports(problem))
                .collect()
        } else {
            self.models.clone()
        }
    }

    /// The validation plan, seeded when it shuffles.
    pub fn validation_plan(&self, seed: u64) -> ValidationPlan {
        match self.validation {
            ValidationPlan::StratifiedKFold { n_splits, .. } => ValidationPlan::stratified(n_splits, seed),
            other => other,
        }
    }
}
