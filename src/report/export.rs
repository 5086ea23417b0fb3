//! JSON run report

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::config::Settings;
use crate::data::ProblemType;
use crate::pipeline::TrainingReport;
use crate::registry::RankedResult;
use crate::selection::{PipelineOutcome, StageCount};

#[derive(Serialize)]
pub struct RunMetadata {
    /// ISO 8601
    pub timestamp: String,
    pub sieve_version: String,
    pub input_file: String,
    pub target_column: String,
    pub problem_type: ProblemType,
    pub n_rows: usize,
    pub settings: Settings,
}

#[derive(Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub model_name: String,
    pub value: Option<f64>,
}

#[derive(Serialize)]
pub struct RunReport<'a> {
    pub metadata: RunMetadata,
    pub selection: Option<&'a PipelineOutcome>,
    pub stage_counts: Vec<StageCount>,
    pub training: &'a [TrainingReport],
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Inputs of [`export_run_report`]
pub struct ExportParams<'a> {
    pub input_file: &'a str,
    pub target_column: &'a str,
    pub problem_type: ProblemType,
    pub n_rows: usize,
    pub settings: &'a Settings,
}

/// Build the report without writing it.
pub fn build_run_report<'a>(
    params: &ExportParams,
    outcome: Option<&'a PipelineOutcome>,
    training: &'a [TrainingReport],
    ranked: &[RankedResult<'_>],
) -> RunReport<'a> {
    let stage_counts = outcome
        .map(|o| {
            let mut counts = o.phase1.stage_counts();
            if let Some(phase2) = &o.phase2 {
                counts.extend(phase2.stage_counts());
            }
            counts
        })
        .unwrap_or_default();

    RunReport {
        metadata: RunMetadata {
            timestamp: Utc::now().to_rfc3339(),
            sieve_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: params.input_file.to_string(),
            target_column: params.target_column.to_string(),
            problem_type: params.problem_type,
            n_rows: params.n_rows,
            settings: params.settings.clone(),
        },
        selection: outcome,
        stage_counts,
        training,
        leaderboard: ranked
            .iter()
            .map(|r| LeaderboardEntry {
                rank: r.rank,
                model_name: r.result.model_name.clone(),
                value: r.value,
            })
            .collect(),
    }
}

/// Write the run report as pretty JSON.
///
/// # Arguments
/// * `output_path` - Destination file
/// * `params` - Run metadata
/// * `outcome` - Last selection outcome, if any
/// * `training` - One report per training action
/// * `ranked` - Current leaderboard
pub fn export_run_report(
    output_path: &Path,
    params: &ExportParams,
    outcome: Option<&PipelineOutcome>,
    training: &[TrainingReport],
    ranked: &[RankedResult<'_>],
) -> Result<()> {
    let report = build_run_report(params, outcome, training, ranked);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report to JSON")?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write run report to {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_without_selection() {
        let settings = Settings::default();
        let params = ExportParams {
            input_file: "data.csv",
            target_column: "y",
            problem_type: ProblemType::Regression,
            n_rows: 10,
            settings: &settings,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_run_report(&path, &params, None, &[], &[]).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["metadata"]["target_column"], "y");
        assert_eq!(json["metadata"]["problem_type"], "regression");
        assert!(json["selection"].is_null());
        assert_eq!(json["stage_counts"].as_array().unwrap().len(), 0);
    }
}
