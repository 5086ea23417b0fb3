//! Tests for scorers, policies and single selection stages

mod common;

use common::{fast_options, imbalanced_dataset, informative_dataset, regression_dataset};
use sieve::data::FeatureSet;
use sieve::selection::{
    run_ensemble, run_pipeline, CombineMode, EnsembleConfig, PhaseMethod, PipelineRequest, RfeBase,
    ScorerKind, ScorerOptions, SelectionPolicy, SelectionStage,
};
use sieve::SieveError;

#[test]
fn test_mi_top5_of_12_returns_the_informative_features() {
    let dataset = informative_dataset(200, 12, &[1, 3, 5, 7, 9], 42);
    let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(5));

    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();

    assert_eq!(result.retained.len(), 5);
    assert_eq!(result.retained, FeatureSet::new(["f1", "f3", "f5", "f7", "f9"]));
    assert_eq!(result.scores.len(), 12, "One score per input feature");
}

#[test]
fn test_mi_ties_resolved_by_column_order() {
    // Six equally informative columns compete for five places
    let dataset = informative_dataset(200, 12, &[0, 2, 4, 6, 8, 10], 7);
    let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(5));

    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();

    assert_eq!(result.retained, FeatureSet::new(["f0", "f2", "f4", "f6", "f8"]));
}

#[test]
fn test_top_n_returns_exactly_k() {
    let dataset = informative_dataset(120, 12, &[2, 4], 3);
    let domain = dataset.feature_set();
    for k in 1..=12 {
        let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(k));
        let result = stage.run(&dataset, &domain, &ScorerOptions::default()).unwrap();
        assert_eq!(result.retained.len(), k, "TopN({}) kept the wrong count", k);
        assert!(result.retained.is_subset_of(&domain));
    }
}

#[test]
fn test_stage_is_idempotent() {
    let dataset = informative_dataset(150, 10, &[0, 5], 11);
    let domain = dataset.feature_set();
    let stage = SelectionStage::new(ScorerKind::TreeImportance, SelectionPolicy::TopN(4));

    let first = stage.run(&dataset, &domain, &fast_options()).unwrap();
    let second = stage.run(&dataset, &domain, &fast_options()).unwrap();

    assert_eq!(first.retained, second.retained);
    assert_eq!(first.scores, second.scores);
}

#[test]
fn test_top_n_larger_than_domain_is_configuration_error() {
    let dataset = informative_dataset(50, 4, &[0], 1);
    let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(5));
    let err = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap_err();
    assert!(matches!(err, SieveError::Configuration(_)));
}

#[test]
fn test_threshold_keeps_high_scores_only() {
    let dataset = informative_dataset(200, 8, &[3, 6], 5);
    let stage = SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::Threshold(0.5));
    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();
    assert_eq!(result.retained, FeatureSet::new(["f3", "f6"]));
}

#[test]
fn test_correlation_with_text_target_is_recoverable_data_error() {
    let dataset = imbalanced_dataset(30, 10, 2);
    let stage = SelectionStage::new(ScorerKind::Correlation, SelectionPolicy::TopN(1));
    let err = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap_err();
    assert!(matches!(err, SieveError::Data(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_correlation_ranks_linear_drivers_first() {
    let dataset = regression_dataset(150, 4, 9);
    let stage = SelectionStage::new(ScorerKind::Correlation, SelectionPolicy::TopN(2));
    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();
    assert_eq!(result.retained, FeatureSet::new(["x0", "x1"]));
}

#[test]
fn test_rfe_keeps_linear_drivers() {
    let dataset = regression_dataset(150, 4, 13);
    let stage = SelectionStage::new(
        ScorerKind::Rfe {
            n_features: None,
            base: RfeBase::Linear,
        },
        SelectionPolicy::TopN(3),
    );
    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();

    assert!(result.scores.binary);
    assert_eq!(result.retained.len(), 3);
    assert!(result.retained.contains("x0"));
    assert!(result.retained.contains("x1"));
}

#[test]
fn test_l1_keeps_nonzero_coefficients() {
    let dataset = regression_dataset(150, 3, 17);
    let stage = SelectionStage::new(ScorerKind::L1 { alpha: 0.05 }, SelectionPolicy::Threshold(0.0));
    let result = stage
        .run(&dataset, &dataset.feature_set(), &ScorerOptions::default())
        .unwrap();

    assert!(result.retained.contains("x0"));
    assert!(result.retained.contains("x1"));
    for feature in result.retained.iter() {
        assert_ne!(result.scores.get(feature), Some(0.0));
    }
}

#[test]
fn test_forest_importance_prefers_informative_features() {
    let dataset = informative_dataset(200, 12, &[1, 3, 5, 7, 9], 21);
    let stage = SelectionStage::new(ScorerKind::TreeImportance, SelectionPolicy::TopN(2));
    let result = stage
        .run(&dataset, &dataset.feature_set(), &fast_options())
        .unwrap();

    let informative = FeatureSet::new(["f1", "f3", "f5", "f7", "f9"]);
    assert!(result.retained.is_subset_of(&informative));
}

#[test]
fn test_stage_parses_from_text() {
    let stage: SelectionStage = "mi:top=5".parse().unwrap();
    assert_eq!(stage.scorer, ScorerKind::MutualInformation);
    assert_eq!(stage.policy, SelectionPolicy::TopN(5));
}

#[test]
fn test_ensemble_side_with_data_error_counts_as_empty() {
    // Correlation cannot score the text target; the MI side still contributes
    let dataset = imbalanced_dataset(30, 10, 2);
    let config = EnsembleConfig {
        first: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(1)),
        second: SelectionStage::new(ScorerKind::Correlation, SelectionPolicy::TopN(1)),
        mode: CombineMode::Union,
    };

    let outcome = run_pipeline(
        &dataset,
        &PipelineRequest::single(PhaseMethod::Ensemble { config }),
        &ScorerOptions::default(),
    )
    .unwrap();

    assert_eq!(outcome.final_features, FeatureSet::new(["a"]));
    assert_eq!(outcome.degradations.len(), 1);
    assert_eq!(outcome.degradations[0].component, "ensemble");
    assert!(outcome.degradations[0].reason.contains("numeric target"));
}

#[test]
fn test_empty_ensemble_intersection_is_a_warning() {
    let dataset = informative_dataset(120, 6, &[0, 3], 4);
    let config = EnsembleConfig {
        first: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(2)),
        second: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::Threshold(100.0)),
        mode: CombineMode::Intersection,
    };

    let report = run_ensemble(&dataset, &dataset.feature_set(), &config, &ScorerOptions::default()).unwrap();

    assert!(report.retained.is_empty());
    assert_eq!(report.first_count(), 2);
    assert_eq!(report.second_count(), 0);
    assert!(report.degradations.is_empty());
    let warning = report.warning.expect("an empty combination is reported");
    assert!(warning.contains("is empty"));
}
