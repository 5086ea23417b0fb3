//! End-to-end tests for two-phase selection and the training context

mod common;

use common::{
    class_sorted_dataset, fast_options, imbalanced_dataset, informative_dataset, regression_dataset,
};
use sieve::config::Settings;
use sieve::data::FeatureSet;
use sieve::estimator::{ModelKind, ParamGrid, ParamValue};
use sieve::pipeline::{PipelineContext, TrainingRequest};
use sieve::selection::{
    run_pipeline, CombineMode, EnsembleConfig, PhaseMethod, PipelineRequest, ScorerKind,
    SelectionPolicy, SelectionStage,
};
use sieve::validation::{CorrectionOutcome, Resampler, ValidationPlan};
use sieve::SieveError;

fn mi_top(k: usize) -> PhaseMethod {
    PhaseMethod::Single {
        stage: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(k)),
    }
}

fn quick_settings() -> Settings {
    Settings {
        scorer_estimators: 20,
        show_progress: false,
        ..Settings::default()
    }
}

#[test]
fn test_phase2_output_is_subset_of_phase1() {
    let dataset = informative_dataset(160, 10, &[1, 4, 7], 3);
    let request = PipelineRequest::single(mi_top(6)).with_phase2(PhaseMethod::Single {
        stage: SelectionStage::new(ScorerKind::TreeImportance, SelectionPolicy::TopN(3)),
    });

    let outcome = run_pipeline(&dataset, &request, &fast_options()).unwrap();
    let phase2 = outcome.phase2.as_ref().unwrap();

    assert_eq!(phase2.input_domain, outcome.phase1.retained);
    assert!(phase2.retained.is_subset_of(&outcome.phase1.retained));
    assert_eq!(outcome.final_features, phase2.retained);
    assert_eq!(outcome.final_features.len(), 3);
}

#[test]
fn test_manual_phase2_outside_phase1_is_rejected() {
    let dataset = informative_dataset(100, 6, &[0, 1], 5);
    let request = PipelineRequest::single(PhaseMethod::Manual {
        features: FeatureSet::new(["f0", "f1"]),
    })
    .with_phase2(PhaseMethod::Manual {
        features: FeatureSet::new(["f0", "f5"]),
    });

    let err = run_pipeline(&dataset, &request, &fast_options()).unwrap_err();
    match err {
        SieveError::Configuration(msg) => assert!(msg.contains("f5")),
        other => panic!("expected a configuration error, got {:?}", other),
    }
}

#[test]
fn test_phase2_top_n_beyond_phase1_is_rejected() {
    let dataset = informative_dataset(100, 8, &[0, 1], 5);
    let request = PipelineRequest::single(mi_top(3)).with_phase2(mi_top(4));
    let err = run_pipeline(&dataset, &request, &fast_options()).unwrap_err();
    assert!(matches!(err, SieveError::Configuration(_)));
}

#[test]
fn test_ensemble_combinations_respect_set_algebra() {
    let dataset = regression_dataset(150, 6, 12);
    let config = |mode| EnsembleConfig {
        first: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::TopN(3)),
        second: SelectionStage::new(ScorerKind::Correlation, SelectionPolicy::TopN(3)),
        mode,
    };

    let union = run_pipeline(
        &dataset,
        &PipelineRequest::single(PhaseMethod::Ensemble {
            config: config(CombineMode::Union),
        }),
        &fast_options(),
    )
    .unwrap();
    let intersection = run_pipeline(
        &dataset,
        &PipelineRequest::single(PhaseMethod::Ensemble {
            config: config(CombineMode::Intersection),
        }),
        &fast_options(),
    )
    .unwrap();

    assert!(intersection.final_features.is_subset_of(&union.final_features));
    assert!(union.final_features.len() <= 6);
    assert!(intersection.final_features.contains("x0"));
}

#[test]
fn test_empty_phase1_is_fatal() {
    let dataset = informative_dataset(100, 6, &[0], 9);
    let request = PipelineRequest::single(PhaseMethod::Single {
        stage: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::Threshold(100.0)),
    });
    let err = run_pipeline(&dataset, &request, &fast_options()).unwrap_err();
    assert!(matches!(err, SieveError::EmptySelection { .. }));
}

#[test]
fn test_failed_phase2_falls_back_to_phase1() {
    // Correlation cannot score a text target; Phase 1 output survives
    let dataset = imbalanced_dataset(40, 20, 4);
    let request = PipelineRequest::single(PhaseMethod::Manual {
        features: FeatureSet::new(["a", "b"]),
    })
    .with_phase2(PhaseMethod::Single {
        stage: SelectionStage::new(ScorerKind::Correlation, SelectionPolicy::TopN(1)),
    });

    let outcome = run_pipeline(&dataset, &request, &fast_options()).unwrap();
    assert!(outcome.phase2.is_none());
    assert!(outcome.is_degraded());
    assert_eq!(outcome.final_features, FeatureSet::new(["a", "b"]));
}

#[test]
fn test_empty_phase2_falls_back_to_phase1_with_warning() {
    let dataset = informative_dataset(120, 8, &[0, 1, 2, 4], 13);
    let request = PipelineRequest::single(mi_top(4)).with_phase2(PhaseMethod::Single {
        stage: SelectionStage::new(ScorerKind::MutualInformation, SelectionPolicy::Threshold(100.0)),
    });

    let outcome = run_pipeline(&dataset, &request, &fast_options()).unwrap();
    let phase2 = outcome.phase2.as_ref().unwrap();
    assert!(phase2.retained.is_empty());
    assert_eq!(outcome.final_features, outcome.phase1.retained);
    assert_eq!(outcome.final_features, FeatureSet::new(["f0", "f1", "f2", "f4"]));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("phase 2 retained no features")));
}

#[test]
fn test_failed_imbalance_correction_degrades_and_still_trains() {
    // Three minority rows in training are too few for 5-neighbour SMOTE
    let dataset = imbalanced_dataset(40, 4, 5);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();

    let report = ctx
        .train(&TrainingRequest::new(ModelKind::DecisionTree).with_imbalance(Resampler::Smote { k: 5 }))
        .unwrap();

    assert!(matches!(report.correction, Some(CorrectionOutcome::Failed { .. })));
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].component, "imbalance");
    assert!(report.degradations[0].reason.contains("SMOTE"));
    assert_eq!(ctx.registry().len(), 1);
}

#[test]
fn test_grid_search_with_no_usable_point_trains_fixed_parameters() {
    let dataset = informative_dataset(120, 4, &[0], 1);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();
    let mut request = TrainingRequest::new(ModelKind::LogisticRegression);
    request.grid = Some(ParamGrid::new().axis("learning_rate", vec![ParamValue::Float(f64::INFINITY)]));

    let report = ctx.train(&request).unwrap();

    assert!(report.search.is_none());
    let components: Vec<&str> = report.degradations.iter().map(|d| d.component.as_str()).collect();
    assert_eq!(components, vec!["grid_search"]);
    assert!(report.degradations[0].reason.contains("trained with fixed parameters"));
    assert!(report.fold_scores.is_some());
    assert_eq!(ctx.registry().len(), 1);
}

#[test]
fn test_failed_validation_degrades_and_still_trains() {
    // Unshuffled 2-fold over class-sorted rows leaves one class per fold
    let dataset = class_sorted_dataset(40, 8);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();
    ctx.set_plan(ValidationPlan::k_fold(2)).unwrap();

    let report = ctx.train(&TrainingRequest::new(ModelKind::LogisticRegression)).unwrap();

    assert!(report.fold_scores.is_none());
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].component, "validation");
    assert!(report.degradations[0].reason.contains("two classes"));
    assert_eq!(ctx.registry().len(), 1);
}

#[test]
fn test_context_trains_on_selected_features_and_registers() {
    let dataset = informative_dataset(120, 6, &[0, 2], 7);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();
    ctx.run_selection(&PipelineRequest::single(mi_top(2))).unwrap();
    assert_eq!(ctx.active_features(), FeatureSet::new(["f0", "f2"]));

    ctx.set_plan(ValidationPlan::k_fold(3)).unwrap();
    let report = ctx.train(&TrainingRequest::new(ModelKind::DecisionTree)).unwrap();

    assert_eq!(report.features, FeatureSet::new(["f0", "f2"]));
    assert_eq!(report.fold_scores.as_ref().map(|s| s.scores.len()), Some(3));
    assert!(report.degradations.is_empty());
    assert_eq!(ctx.registry().len(), 1);
    assert_eq!(report.registry_index, 0);
    let f1 = ctx.registry().results()[0].metric("f1_weighted").unwrap();
    assert!((f1 - 1.0).abs() < 1e-12);
}

#[test]
fn test_context_fatal_error_registers_nothing() {
    let dataset = informative_dataset(80, 4, &[1], 2);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();

    let err = ctx
        .train(&TrainingRequest::new(ModelKind::LinearRegression))
        .unwrap_err();
    assert!(matches!(err, SieveError::Configuration(_)));
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_context_failed_selection_clears_previous_outcome() {
    let dataset = informative_dataset(100, 6, &[0, 3], 6);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();
    ctx.run_selection(&PipelineRequest::single(mi_top(2))).unwrap();
    assert_eq!(ctx.active_features(), FeatureSet::new(["f0", "f3"]));

    assert!(ctx.run_selection(&PipelineRequest::single(mi_top(50))).is_err());
    assert!(ctx.outcome().is_none());
    assert_eq!(ctx.active_features(), ctx.dataset().feature_set());
}

#[test]
fn test_leaderboard_orders_trained_models() {
    let dataset = regression_dataset(120, 2, 21);
    let mut ctx = PipelineContext::new(dataset, quick_settings()).unwrap();
    ctx.train(&TrainingRequest::new(ModelKind::KNearestNeighbors)).unwrap();
    ctx.train(&TrainingRequest::new(ModelKind::LinearRegression)).unwrap();

    let ranked = ctx.leaderboard(None);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].result.model_name, "Linear Regression");

    ctx.reset_registry();
    assert!(ctx.leaderboard(None).is_empty());
}
