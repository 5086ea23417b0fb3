//! Selection summary: retained counts per stage and phase

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::selection::{PhaseDetail, PhaseOutcome, PipelineOutcome, StageCount};

/// Printable view of a pipeline outcome
pub struct SelectionSummary<'a> {
    outcome: &'a PipelineOutcome,
}

impl<'a> SelectionSummary<'a> {
    pub fn new(outcome: &'a PipelineOutcome) -> Self {
        Self { outcome }
    }

    /// Stage/count rows of both phases, phase-prefixed
    pub fn rows(&self) -> Vec<(String, StageCount)> {
        let mut rows: Vec<(String, StageCount)> = self
            .outcome
            .phase1
            .stage_counts()
            .into_iter()
            .map(|c| ("phase 1".to_string(), c))
            .collect();
        if let Some(phase2) = &self.outcome.phase2 {
            rows.extend(
                phase2
                    .stage_counts()
                    .into_iter()
                    .map(|c| ("phase 2".to_string(), c)),
            );
        }
        rows
    }

    /// `a → b → c` chains of each cascade phase
    pub fn cascade_chains(&self) -> Vec<String> {
        [Some(&self.outcome.phase1), self.outcome.phase2.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|phase: &PhaseOutcome| match &phase.detail {
                PhaseDetail::Cascade { report } => Some(report.count_chain()),
                _ => None,
            })
            .collect()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Phase").add_attribute(Attribute::Bold),
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Retained").add_attribute(Attribute::Bold),
        ]);
        for (phase, count) in self.rows() {
            table.add_row(vec![
                Cell::new(phase),
                Cell::new(&count.stage),
                Cell::new(count.retained).fg(Color::Cyan),
            ]);
        }
        table.add_row(vec![
            Cell::new("final"),
            Cell::new(""),
            Cell::new(self.outcome.final_features.len())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table
    }

    pub fn display(&self) {
        println!();
        println!("    {}", style("SELECTION SUMMARY").white().bold());
        println!("    {}", style("─".repeat(50)).dim());

        for line in self.table().to_string().lines() {
            println!("    {}", line);
        }

        for chain in self.cascade_chains() {
            println!("    {} {}", style("Cascade:").dim(), chain);
        }

        println!();
        println!(
            "    {} {}",
            style("Selected:").cyan(),
            self.outcome
                .final_features
                .names()
                .join(", ")
        );

        for degradation in &self.outcome.degradations {
            println!("    {} {}", style("Degraded").yellow(), degradation);
        }
        for warning in &self.outcome.warnings {
            println!("    {} {}", style("Warning").yellow(), warning);
        }
    }
}
