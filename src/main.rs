//! Sieve: feature selection and model comparison CLI
//!
//! Loads a tabular file, narrows its features in one or two selection
//! phases, trains each requested model under a validation plan and prints
//! the ranked results.

use anyhow::Result;
use clap::Parser;

use sieve::cli::{run, Cli};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    run(&cli)
}
