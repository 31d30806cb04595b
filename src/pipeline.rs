//! Per-company pipeline and parallel dispatch.
//!
//! Each company runs filter → aggregate → write on its own; the dispatcher
//! fans companies out over a rayon pool and collects every outcome, so one
//! failure never stops the others.

use crate::aggregator::{CustomerAggregator, LogObserver};
use crate::config::PipelineConfig;
use crate::customer::write_customers;
use crate::error::{PreprocessError, Result};
use crate::filter::TransactionFilter;
use crate::paths::DataLayout;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

/// What one successful company run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyReport {
    pub company: String,
    pub transactions: usize,
    pub customers: usize,
    pub output_path: PathBuf,
}

/// Result of one company in a batch.
#[derive(Debug)]
pub struct CompanyOutcome {
    pub company: String,
    pub result: Result<CompanyReport>,
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[CompanyOutcome]) -> Self {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        BatchSummary {
            succeeded: outcomes.len() - failed,
            failed,
        }
    }
}

/// Runs the preprocessing of a set of companies.
pub struct Pipeline {
    filter: TransactionFilter,
    aggregator: CustomerAggregator,
    jobs: Option<usize>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Pipeline {
            filter: TransactionFilter::new(config.layout.clone(), config.chunk_size),
            aggregator: CustomerAggregator::new(config.aggregation.clone()),
            jobs: config.jobs,
        }
    }

    fn layout(&self) -> &DataLayout {
        self.filter.layout()
    }

    /// Processes one company and writes its customer file.
    pub fn process_company(&self, company: &str) -> Result<CompanyReport> {
        info!("Processing company {}", company);

        let transactions = self.filter.load(company)?;
        let aggregator = self
            .aggregator
            .clone()
            .with_observer(Arc::new(LogObserver::new(company)));
        let customers = aggregator.aggregate(&transactions)?;

        let layout = self.layout();
        DataLayout::ensure_dir(&layout.customers_dir())?;
        let output_path = layout.customers_file(company);
        let writer = BufWriter::new(File::create(&output_path)?);
        write_customers(writer, &customers, aggregator.config().count_returns)?;

        info!("Customer data saved to: {}", output_path.display());

        Ok(CompanyReport {
            company: company.to_string(),
            transactions: transactions.len(),
            customers: customers.len(),
            output_path,
        })
    }

    /// Processes every company in parallel.
    ///
    /// Outcomes are returned in the order of `companies`.
    pub fn run(&self, companies: &[String]) -> Result<Vec<CompanyOutcome>> {
        let mut pool = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.jobs {
            pool = pool.num_threads(jobs);
        }
        let pool = pool.build()?;

        let outcomes: Vec<CompanyOutcome> = pool.install(|| {
            companies
                .par_iter()
                .map(|company| {
                    let result = self.process_company(company);
                    if let Err(e) = &result {
                        error!("Company {} failed: {}", company, e);
                    }
                    CompanyOutcome {
                        company: company.clone(),
                        result,
                    }
                })
                .collect()
        });

        let summary = BatchSummary::from_outcomes(&outcomes);
        if summary.failed > 0 {
            warn!(
                "Finished {} companies: {} succeeded, {} failed",
                outcomes.len(),
                summary.succeeded,
                summary.failed
            );
        } else {
            info!("Finished {} companies", outcomes.len());
        }

        Ok(outcomes)
    }
}

/// Runs every configured company and fails if any of them failed.
pub fn run_batch(config: &PipelineConfig) -> Result<Vec<CompanyReport>> {
    config.validate()?;

    let outcomes = Pipeline::new(config).run(&config.companies)?;
    let summary = BatchSummary::from_outcomes(&outcomes);

    let mut reports = Vec::with_capacity(summary.succeeded);
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => reports.push(report),
            Err(e) => failures.push(format!("{}: {}", outcome.company, e)),
        }
    }

    if failures.is_empty() {
        Ok(reports)
    } else {
        Err(PreprocessError::BatchFailed {
            failed: summary.failed,
            total: summary.failed + summary.succeeded,
            details: failures.join("; "),
        })
    }
}
