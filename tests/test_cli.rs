//! Tests for CLI argument parsing and end-to-end runs

mod common;

use assert_cmd::Command;
use clap::Parser;
use predicates::prelude::*;

use common::{create_temp_csv, informative_frame};
use sieve::cli::Cli;
use sieve::data::ProblemType;
use sieve::estimator::ModelKind;
use sieve::validation::{Resampler, ValidationPlan};

#[test]
fn test_cli_default_values() {
    let cli = Cli::parse_from(["sieve", "-i", "data.csv", "-t", "target"]);

    assert_eq!(cli.phase1, "cascade", "Default phase 1 should be the cascade");
    assert!(cli.phase2.is_none());
    assert_eq!(cli.validation, ValidationPlan::HoldOut);
    assert!(cli.imbalance.is_none());
    assert!(!cli.grid_search);
    assert_eq!(cli.infer_schema_length, 10000);

    let settings = cli.settings().unwrap();
    assert_eq!(settings.test_fraction, 0.2);
    assert_eq!(settings.seed, 42);
}

#[test]
fn test_cli_overrides_reach_settings() {
    let cli = Cli::parse_from([
        "sieve",
        "-i",
        "data.csv",
        "-t",
        "target",
        "--test-fraction",
        "0.3",
        "--seed",
        "7",
        "--imbalance-threshold",
        "2.0",
        "--no-progress",
    ]);

    let settings = cli.settings().unwrap();
    assert_eq!(settings.test_fraction, 0.3);
    assert_eq!(settings.seed, 7);
    assert_eq!(settings.imbalance_threshold, 2.0);
    assert!(!settings.show_progress);
}

#[test]
fn test_cli_models_and_plans() {
    let cli = Cli::parse_from([
        "sieve",
        "-i",
        "data.csv",
        "-t",
        "target",
        "--models",
        "tree,knn",
        "--validation",
        "stratified:4",
        "--imbalance",
        "smote",
    ]);

    assert_eq!(
        cli.model_kinds(ProblemType::Classification),
        vec![ModelKind::DecisionTree, ModelKind::KNearestNeighbors]
    );
    assert_eq!(cli.imbalance, Some(Resampler::Smote { k: 5 }));
    assert_eq!(cli.validation_plan(9), ValidationPlan::stratified(4, 9));
}

#[test]
fn test_cli_default_models_follow_problem_type() {
    let cli = Cli::parse_from(["sieve", "-i", "data.csv", "-t", "target"]);
    let models = cli.model_kinds(ProblemType::Regression);
    assert!(models.contains(&ModelKind::LinearRegression));
    assert!(!models.contains(&ModelKind::LogisticRegression));
}

#[test]
fn test_cli_rejects_unknown_model() {
    let result = Cli::try_parse_from(["sieve", "-i", "data.csv", "-t", "target", "--models", "svm"]);
    assert!(result.is_err());
}

#[test]
fn test_binary_help() {
    Command::cargo_bin("sieve")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sieve"));
}

#[test]
fn test_binary_end_to_end_run() {
    let mut df = informative_frame(120, 6, &[0, 2], 3);
    let (temp_dir, csv_path) = create_temp_csv(&mut df);
    let report_path = temp_dir.path().join("report.json");

    Command::cargo_bin("sieve")
        .unwrap()
        .args(["-i", csv_path.to_str().unwrap(), "-t", "target"])
        .args(["--phase1", "mi:top=2", "--models", "tree", "--no-progress"])
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Leaderboard"))
        .stdout(predicate::str::contains("Decision Tree"));

    let json = std::fs::read_to_string(&report_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value.is_object());
}

#[test]
fn test_binary_missing_input_fails() {
    Command::cargo_bin("sieve")
        .unwrap()
        .args(["-i", "/nonexistent/data.csv", "-t", "target", "--no-progress"])
        .assert()
        .failure();
}
