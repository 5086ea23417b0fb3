//! End-to-end run behind the `sieve` binary

use std::time::Instant;

use anyhow::{Context, Result};
use console::style;

use super::Cli;
use crate::data::{drop_columns, load_frame, Dataset};
use crate::pipeline::{PipelineContext, TrainingReport, TrainingRequest};
use crate::report::{export_run_report, fold_table, ExportParams, Leaderboard, SelectionSummary};
use crate::utils::{
    create_search_bar, create_spinner, finish_with_success, finish_with_warning, print_banner,
    print_completion, print_config, print_info, print_step_header, print_success, print_warning,
};

/// Load, select, train every requested model, then rank and report.
pub fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    let show = settings.show_progress;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&cli.input, &cli.target, &settings);

    // Step 1: Load
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading input...", show);
    let (df, stats) = load_frame(&cli.input, cli.infer_schema_length)?;
    let df = drop_columns(df, &cli.drop_columns);
    let dataset = Dataset::from_frame(&df, &cli.target, cli.problem)
        .with_context(|| format!("Cannot build a dataset from {}", cli.input.display()))?;
    finish_with_success(&spinner, "Dataset loaded");
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", stats.rows);
    println!("      Features: {}", dataset.features().n_cols());
    println!("      Problem: {}", dataset.problem_type());
    println!("      Estimated memory: {:.2} MB", stats.memory_mb);
    log::debug!("Load took {:.2?}", step_start.elapsed());

    let problem = dataset.problem_type();
    let n_rows = dataset.n_rows();
    let mut ctx = PipelineContext::new(dataset, settings.clone())?;
    ctx.set_plan(cli.validation_plan(settings.seed))?;

    // Step 2: Select
    print_step_header(2, "Feature Selection");
    let request = cli.pipeline_request(&settings)?;
    let spinner = create_spinner("Scoring features...", show);
    match ctx.run_selection(&request) {
        Ok(outcome) => {
            if outcome.is_degraded() {
                finish_with_warning(&spinner, "Selection finished with degradations");
            } else {
                finish_with_success(&spinner, "Selection complete");
            }
            SelectionSummary::new(outcome).display();
        }
        Err(e) => {
            finish_with_warning(&spinner, "Selection failed");
            return Err(e).context("Feature selection failed");
        }
    }

    // Step 3: Train
    print_step_header(3, &format!("Training ({})", ctx.plan()));
    let mut reports: Vec<TrainingReport> = Vec::new();
    for kind in cli.model_kinds(problem) {
        let mut request = TrainingRequest::new(kind);
        request.metric = cli.metric;
        request.imbalance = cli.imbalance;
        if cli.grid_search {
            request = request.with_default_grid();
        }

        let bar = create_search_bar(&format!("Searching {}", kind), show && cli.grid_search);
        match ctx.train_with_progress(&request, Some(&bar)) {
            Ok(report) => {
                bar.finish_and_clear();
                print_success(&format!("{} trained", kind));
                print_training(&report);
                reports.push(report);
            }
            Err(e) if e.is_recoverable() => {
                bar.finish_and_clear();
                print_warning(&format!("{} skipped: {}", kind, e));
            }
            Err(e) => {
                bar.finish_and_clear();
                return Err(e).with_context(|| format!("Training {} failed", kind));
            }
        }
    }

    // Step 4: Rank
    print_step_header(4, "Leaderboard");
    let ranked = ctx.leaderboard(cli.metric);
    Leaderboard::new(problem, ranked.clone()).display();

    if let Some(path) = &cli.save_model {
        match ranked.first() {
            Some(best) => {
                let json = best.result.artifact.to_json()?;
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write model to {}", path.display()))?;
                print_success(&format!("Saved {} to {}", best.result.model_name, path.display()));
            }
            None => print_warning("No trained model to save"),
        }
    }

    if let Some(path) = &cli.report {
        let params = ExportParams {
            input_file: &cli.input.display().to_string(),
            target_column: &cli.target,
            problem_type: problem,
            n_rows,
            settings: ctx.settings(),
        };
        export_run_report(path, &params, ctx.outcome(), &reports, &ranked)?;
        print_success(&format!("Report written to {}", path.display()));
    }

    print_completion(reports.len());
    Ok(())
}

fn print_training(report: &TrainingReport) {
    if let Some(correction) = &report.correction {
        print_info(&format!("Imbalance: {}", correction));
    }
    if let Some(search) = &report.search {
        print_info(&format!(
            "Best {} = {:.4} with {}",
            search.metric, search.best_score, search.best_params
        ));
    }
    if let Some(folds) = &report.fold_scores {
        if folds.scores.len() > 1 {
            for line in fold_table(folds).to_string().lines() {
                println!("      {}", line);
            }
        }
    }
    for degradation in &report.degradations {
        print_warning(&degradation.to_string());
    }
}
