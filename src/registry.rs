//! Trained-model results and their ranking
//!
//! The registry only grows: one result per successful training action, never
//! edited afterwards. `reset` is the single way to remove anything and it
//! clears everything.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::ProblemType;
use crate::metrics::ScoringMetric;
use crate::pipeline::ModelArtifact;

/// Outcome of one successful training action.
#[derive(Debug, Clone, Serialize)]
pub struct TrainedModelResult {
    pub model_name: String,
    pub problem_type: ProblemType,
    pub metrics: BTreeMap<String, f64>,
    pub artifact: ModelArtifact,
    pub y_test: Vec<f64>,
    pub y_pred: Vec<f64>,
}

impl TrainedModelResult {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// A ranked view of one registry entry
#[derive(Debug, Clone, Copy)]
pub struct RankedResult<'a> {
    pub rank: usize,
    /// Position in the registry, i.e. registration order
    pub index: usize,
    pub result: &'a TrainedModelResult,
    pub value: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    results: Vec<TrainedModelResult>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, result: TrainedModelResult) {
        log::info!(
            "Registered {} ({} results)",
            result.model_name,
            self.results.len() + 1
        );
        self.results.push(result);
    }

    pub fn results(&self) -> &[TrainedModelResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrainedModelResult> {
        self.results.get(index)
    }

    pub fn reset(&mut self) {
        self.results.clear();
    }

    /// Rank the results of one problem type.
    ///
    /// Classification ranks by weighted F1, descending. Regression ranks by
    /// `metric` (R² when `None`); R² descends, error metrics ascend.
    /// Results missing the metric come last; equal values keep registration
    /// order.
    pub fn rank(&self, problem: ProblemType, metric: Option<ScoringMetric>) -> Vec<RankedResult<'_>> {
        let metric = match problem {
            ProblemType::Classification => ScoringMetric::F1Weighted,
            ProblemType::Regression => metric
                .filter(|m| m.problem_type() == ProblemType::Regression)
                .unwrap_or(ScoringMetric::R2),
        };
        let key = metric.key();
        let ascending = matches!(
            metric,
            ScoringMetric::NegMeanSquaredError
                | ScoringMetric::NegRootMeanSquaredError
                | ScoringMetric::NegMeanAbsoluteError
        );

        let mut entries: Vec<(usize, &TrainedModelResult, Option<f64>)> = self
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.problem_type == problem)
            .map(|(i, r)| (i, r, r.metric(key).filter(|v| !v.is_nan())))
            .collect();

        entries.sort_by(|a, b| match (a.2, b.2) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        entries
            .into_iter()
            .enumerate()
            .map(|(rank, (index, result, value))| RankedResult {
                rank: rank + 1,
                index,
                result,
                value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureSet;
    use crate::estimator::ModelKind;

    fn result(name: &str, problem: ProblemType, metrics: &[(&str, f64)]) -> TrainedModelResult {
        TrainedModelResult {
            model_name: name.to_string(),
            problem_type: problem,
            metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            artifact: ModelArtifact {
                model: ModelKind::DecisionTree.build(0),
                features: FeatureSet::new(["a"]),
                problem_type: problem,
                class_labels: Vec::new(),
            },
            y_test: vec![],
            y_pred: vec![],
        }
    }

    #[test]
    fn test_classification_ranks_by_f1() {
        let mut registry = ModelRegistry::new();
        registry.register(result("low", ProblemType::Classification, &[("f1_weighted", 0.80)]));
        registry.register(result("high", ProblemType::Classification, &[("f1_weighted", 0.92)]));

        let ranked = registry.rank(ProblemType::Classification, None);
        assert_eq!(ranked[0].result.model_name, "high");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].result.model_name, "low");
        // Ranking leaves the registry order alone
        assert_eq!(registry.results()[0].model_name, "low");
    }

    #[test]
    fn test_regression_error_metric_ascends() {
        let mut registry = ModelRegistry::new();
        registry.register(result("a", ProblemType::Regression, &[("r2", 0.9), ("mae", 2.0)]));
        registry.register(result("b", ProblemType::Regression, &[("r2", 0.7), ("mae", 1.0)]));

        let by_r2 = registry.rank(ProblemType::Regression, None);
        assert_eq!(by_r2[0].result.model_name, "a");
        let by_mae = registry.rank(ProblemType::Regression, Some(ScoringMetric::NegMeanAbsoluteError));
        assert_eq!(by_mae[0].result.model_name, "b");
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut registry = ModelRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register(result(name, ProblemType::Classification, &[("f1_weighted", 0.5)]));
        }
        let names: Vec<&str> = registry
            .rank(ProblemType::Classification, None)
            .iter()
            .map(|r| r.result.model_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_missing_metric_ranks_last() {
        let mut registry = ModelRegistry::new();
        registry.register(result("none", ProblemType::Classification, &[]));
        registry.register(result("some", ProblemType::Classification, &[("f1_weighted", 0.1)]));
        let ranked = registry.rank(ProblemType::Classification, None);
        assert_eq!(ranked[0].result.model_name, "some");
        assert_eq!(ranked[1].value, None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut registry = ModelRegistry::new();
        registry.register(result("x", ProblemType::Regression, &[("r2", 0.5)]));
        registry.reset();
        assert!(registry.is_empty());
        assert!(registry.rank(ProblemType::Regression, None).is_empty());
    }
}
