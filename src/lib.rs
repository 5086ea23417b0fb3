//! Sieve: staged feature selection and validated model comparison
//!
//! A library for narrowing the features of a tabular dataset through
//! pluggable scorers (single stages, a three-stage cascade, two-way
//! ensembles, in up to two phases) and for comparing models trained on the
//! result under hold-out, k-fold, stratified, leave-one-out or leave-p-out
//! validation, with optional imbalance correction and grid search.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod selection;
pub mod utils;
pub mod validation;

pub use error::{Degradation, Result, SieveError};
