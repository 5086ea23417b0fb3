//! Tests for training-partition imbalance correction

mod common;

use common::imbalanced_dataset;
use sieve::data::{class_counts, train_test_split, ProblemType};
use sieve::validation::{correct_imbalance, imbalance_ratio, CorrectionOutcome, ImbalanceConfig, Resampler};

const ALL_RESAMPLERS: [Resampler; 5] = [
    Resampler::RandomOver,
    Resampler::RandomUnder,
    Resampler::Smote { k: 5 },
    Resampler::SmoteEnn { k: 5 },
    Resampler::SmoteTomek { k: 5 },
];

#[test]
fn test_test_partition_is_bit_identical_after_correction() {
    let dataset = imbalanced_dataset(90, 30, 1);
    let split = train_test_split(dataset.features(), dataset.y(), 0.25, 8, true).unwrap();
    let x_test_bits: Vec<Vec<u64>> = split
        .x_test
        .columns()
        .iter()
        .map(|c| c.iter().map(|v| v.to_bits()).collect())
        .collect();
    let y_test_bits: Vec<u64> = split.y_test.iter().map(|v| v.to_bits()).collect();

    for resampler in ALL_RESAMPLERS {
        let (corrected, outcome) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(resampler));
        assert!(matches!(outcome, CorrectionOutcome::Applied { .. }), "{} did not apply", resampler);

        let bits: Vec<Vec<u64>> = corrected
            .x_test
            .columns()
            .iter()
            .map(|c| c.iter().map(|v| v.to_bits()).collect())
            .collect();
        assert_eq!(bits, x_test_bits);
        assert_eq!(
            corrected.y_test.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            y_test_bits
        );
    }
}

#[test]
fn test_over_and_smote_balance_training_classes() {
    let dataset = imbalanced_dataset(60, 15, 2);
    let split = train_test_split(dataset.features(), dataset.y(), 0.2, 4, true).unwrap();

    for resampler in [Resampler::RandomOver, Resampler::Smote { k: 5 }] {
        let (corrected, _) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(resampler));
        assert_eq!(imbalance_ratio(&corrected.y_train), 1.0);
        let counts = class_counts(&corrected.y_train);
        assert_eq!(counts[0].1, counts[1].1);
        assert_eq!(corrected.x_train.n_rows(), corrected.y_train.len());
    }
}

#[test]
fn test_threshold_controls_trigger() {
    let dataset = imbalanced_dataset(60, 30, 3);
    let split = train_test_split(dataset.features(), dataset.y(), 0.2, 4, true).unwrap();
    let ratio = imbalance_ratio(&split.y_train);
    assert!(ratio > 1.5);

    let mut config = ImbalanceConfig::new(Resampler::RandomUnder);
    config.threshold = ratio + 0.5;
    let (unchanged, outcome) = correct_imbalance(&split, ProblemType::Classification, &config);
    assert!(matches!(outcome, CorrectionOutcome::NotNeeded { .. }));
    assert_eq!(unchanged, split);
}

#[test]
fn test_too_few_minority_rows_fall_back_to_original() {
    let dataset = imbalanced_dataset(40, 4, 5);
    let split = train_test_split(dataset.features(), dataset.y(), 0.25, 6, true).unwrap();
    let (out, outcome) = correct_imbalance(&split, ProblemType::Classification, &ImbalanceConfig::new(Resampler::Smote { k: 5 }));

    match outcome {
        CorrectionOutcome::Failed { reason, .. } => assert!(reason.contains("SMOTE")),
        other => panic!("expected a failed correction, got {:?}", other),
    }
    assert_eq!(out, split);
}
