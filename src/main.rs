//! LTV Preprocess CLI
//!
//! Builds customer-level feature files for every configured company.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- config.toml               # companies from companies.active
//! cargo run -- config.toml 104900040     # explicit companies
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: overrides the configured log level

use ltv_preprocess::{init_logging, run_batch, PipelineConfig, PreprocessError, Result};
use log::info;
use std::env;
use std::path::Path;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(PreprocessError::MissingArgument);
    }

    let mut config = PipelineConfig::load(Path::new(&args[1]))?;
    if args.len() > 2 {
        config = config.with_companies(args[2..].to_vec());
    }
    config.validate()?;

    init_logging(&config.logging, &config.layout)?;

    let reports = run_batch(&config)?;
    for report in &reports {
        info!(
            "Company {}: {} transactions -> {} customers ({})",
            report.company,
            report.transactions,
            report.customers,
            report.output_path.display()
        );
    }

    Ok(())
}
