//! Model leaderboard and fold-score tables

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::data::ProblemType;
use crate::registry::RankedResult;
use crate::validation::FoldScores;

const CLASSIFICATION_COLUMNS: [&str; 4] = ["accuracy", "precision_weighted", "recall_weighted", "f1_weighted"];
const REGRESSION_COLUMNS: [&str; 4] = ["r2", "mse", "rmse", "mae"];

/// Ranked registry rows for display
pub struct Leaderboard<'a> {
    problem: ProblemType,
    rows: Vec<RankedResult<'a>>,
}

impl<'a> Leaderboard<'a> {
    pub fn new(problem: ProblemType, rows: Vec<RankedResult<'a>>) -> Self {
        Self { problem, rows }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self.problem {
            ProblemType::Classification => &CLASSIFICATION_COLUMNS,
            ProblemType::Regression => &REGRESSION_COLUMNS,
        }
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        let mut header = vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Model").add_attribute(Attribute::Bold),
            Cell::new("Features").add_attribute(Attribute::Bold),
        ];
        header.extend(
            self.columns()
                .iter()
                .map(|c| Cell::new(c).add_attribute(Attribute::Bold)),
        );
        table.set_header(header);

        for row in &self.rows {
            let color = if row.rank == 1 { Color::Green } else { Color::White };
            let mut cells = vec![
                Cell::new(row.rank).fg(color),
                Cell::new(&row.result.model_name).fg(color),
                Cell::new(row.result.artifact.features.len()),
            ];
            cells.extend(self.columns().iter().map(|key| {
                match row.result.metric(key) {
                    Some(v) => Cell::new(format!("{:.4}", v)),
                    None => Cell::new("-"),
                }
            }));
            table.add_row(cells);
        }
        table
    }

    pub fn display(&self) {
        println!();
        println!("    {}", style("MODEL LEADERBOARD").white().bold());
        println!("    {}", style("─".repeat(50)).dim());
        if self.rows.is_empty() {
            println!("    {}", style("No trained models").dim());
            return;
        }
        for line in self.table().to_string().lines() {
            println!("    {}", line);
        }
    }
}

/// Per-fold scores with mean and standard deviation
pub fn fold_table(scores: &FoldScores) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Fold").add_attribute(Attribute::Bold),
        Cell::new(scores.metric.to_string()).add_attribute(Attribute::Bold),
    ]);
    for (i, score) in scores.scores.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(format!("{:.4}", score))]);
    }
    table.add_row(vec![
        Cell::new("mean ± std").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.4} ± {:.4}", scores.mean, scores.std))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ScoringMetric;

    #[test]
    fn test_fold_table_lists_every_fold() {
        let scores = FoldScores::new(ScoringMetric::Accuracy, vec![0.5, 1.0]);
        let rendered = fold_table(&scores).to_string();
        assert!(rendered.contains("0.5000"));
        assert!(rendered.contains("0.7500 ± 0.2500"));
    }

    #[test]
    fn test_empty_leaderboard_has_header_only() {
        let board = Leaderboard::new(ProblemType::Regression, Vec::new());
        let rendered = board.table().to_string();
        assert!(rendered.contains("r2"));
        assert!(rendered.contains("Rank"));
    }
}
