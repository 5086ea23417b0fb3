//! Validation: fold strategies, imbalance correction and grid search

pub mod imbalance;
pub mod search;
pub mod strategy;

pub use imbalance::{
    correct_imbalance, imbalance_ratio, resample, CorrectionOutcome, ImbalanceConfig, Resampler,
};
pub use search::{GridPointResult, GridSearch, SearchSummary, DEFAULT_SEARCH_FOLDS};
pub use strategy::{binomial, Fold, FoldLimits, FoldScores, ValidationPlan};
