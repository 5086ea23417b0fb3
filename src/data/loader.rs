//! Dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

/// Shape and memory statistics of a loaded frame
#[derive(Debug, Clone, Copy)]
pub struct LoadStats {
    pub rows: usize,
    pub cols: usize,
    pub memory_mb: f64,
}

/// Load a dataset from a file (CSV or Parquet based on extension)
///
/// # Arguments
/// * `path` - File to read
/// * `infer_schema_length` - Rows used for CSV schema inference (0 = full scan)
pub fn load_frame(path: &Path, infer_schema_length: usize) -> Result<(DataFrame, LoadStats)> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    let df = lf
        .collect()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);

    log::info!("Loaded {} ({} rows, {} columns)", path.display(), rows, cols);

    Ok((
        df,
        LoadStats {
            rows,
            cols,
            memory_mb,
        },
    ))
}

/// Drop columns the user excluded before analysis, ignoring unknown names
pub fn drop_columns(df: DataFrame, columns: &[String]) -> DataFrame {
    let present: Vec<String> = columns
        .iter()
        .filter(|c| df.get_column_names().iter().any(|n| n.as_str() == c.as_str()))
        .cloned()
        .collect();
    if present.is_empty() {
        df
    } else {
        df.drop_many(&present)
    }
}
