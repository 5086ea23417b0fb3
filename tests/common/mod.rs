//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

use sieve::data::{Dataset, ProblemType};
use sieve::selection::ScorerOptions;

/// Binary-target frame where the listed columns separate the classes exactly
/// and every other column is uniform noise.
///
/// Columns are named `f0..f{n_features-1}`; the target is `target` (0/1,
/// alternating so both classes are the same size).
pub fn informative_frame(n_rows: usize, n_features: usize, informative: &[usize], seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let target: Vec<i32> = (0..n_rows).map(|i| (i % 2) as i32).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(n_features + 1);
    for j in 0..n_features {
        let values: Vec<f64> = if informative.contains(&j) {
            target
                .iter()
                .map(|&t| t as f64 * 10.0 * (j as f64 + 1.0) + rng.gen::<f64>())
                .collect()
        } else {
            (0..n_rows).map(|_| rng.gen::<f64>() * 100.0).collect()
        };
        columns.push(Column::new(format!("f{}", j).into(), values));
    }
    columns.push(Column::new("target".into(), target));
    DataFrame::new(columns).unwrap()
}

/// Classification dataset built from [`informative_frame`]
pub fn informative_dataset(n_rows: usize, n_features: usize, informative: &[usize], seed: u64) -> Dataset {
    let df = informative_frame(n_rows, n_features, informative, seed);
    Dataset::from_frame(&df, "target", None).unwrap()
}

/// Regression frame: `y = 3*x0 - 2*x1 + noise`, plus `n_noise` unrelated columns
pub fn regression_frame(n_rows: usize, n_noise: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let x0: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
    let x1: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
    let y: Vec<f64> = x0
        .iter()
        .zip(&x1)
        .map(|(a, b)| 3.0 * a - 2.0 * b + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns = vec![
        Column::new("x0".into(), x0),
        Column::new("x1".into(), x1),
    ];
    for j in 0..n_noise {
        let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>()).collect();
        columns.push(Column::new(format!("noise{}", j).into(), values));
    }
    columns.push(Column::new("y".into(), y));
    DataFrame::new(columns).unwrap()
}

pub fn regression_dataset(n_rows: usize, n_noise: usize, seed: u64) -> Dataset {
    Dataset::from_frame(&regression_frame(n_rows, n_noise, seed), "y", Some(ProblemType::Regression)).unwrap()
}

/// Two well-separated classes of `n_major` and `n_minor` rows
pub fn imbalanced_dataset(n_major: usize, n_minor: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = n_major + n_minor;
    let label: Vec<&str> = (0..n).map(|i| if i < n_major { "common" } else { "rare" }).collect();
    let a: Vec<f64> = (0..n)
        .map(|i| (if i < n_major { 0.0 } else { 50.0 }) + rng.gen::<f64>() * 10.0)
        .collect();
    let b: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let df = df! {
        "a" => a,
        "b" => b,
        "label" => label,
    }
    .unwrap();
    Dataset::from_frame(&df, "label", None).unwrap()
}

/// Binary dataset with every class-0 row before every class-1 row, so
/// unshuffled contiguous folds can hold a single class
pub fn class_sorted_dataset(n_per_class: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 2 * n_per_class;
    let target: Vec<i32> = (0..n).map(|i| i32::from(i >= n_per_class)).collect();
    let a: Vec<f64> = target.iter().map(|&t| t as f64 * 20.0 + rng.gen::<f64>()).collect();
    let b: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let df = df! {
        "a" => a,
        "b" => b,
        "target" => target,
    }
    .unwrap();
    Dataset::from_frame(&df, "target", None).unwrap()
}

/// Scorer settings with small ensembles so tests stay fast
pub fn fast_options() -> ScorerOptions {
    ScorerOptions {
        n_estimators: 20,
        ..ScorerOptions::default()
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}
