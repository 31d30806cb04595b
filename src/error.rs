//! Error types for the preprocessing pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for preprocessing operations
pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Errors that can occur while preprocessing a company's transactions.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// Failed to open, read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed configuration file
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing config file argument
    #[error("Missing config file argument. Usage: ltv-preprocess <config.toml> [company ...]")]
    MissingArgument,

    /// Raw transaction source has not been downloaded
    #[error("Transactions file not found at {}. Download the transactions dataset first.", path.display())]
    SourceNotFound { path: PathBuf },

    /// The raw source holds no rows for the company
    #[error("No transactions found for company {company} in the dataset")]
    NoTransactions { company: String },

    /// No positive-amount transaction to calibrate any customer on
    #[error("No usable transactions: {0}")]
    EmptyInput(String),

    /// A required field is absent from a record or a header
    #[error("Missing required field '{field}' at record {row}")]
    MissingField { field: &'static str, row: usize },

    /// A required field is present but cannot be parsed
    #[error("Invalid record {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Calibration sum is not positive, so its log is undefined
    #[error("Calibration value {value} for customer {customer_id} is not positive")]
    NonPositiveCalibration { customer_id: String, value: String },

    /// One or more companies of a batch failed
    #[error("{failed} of {total} companies failed: {details}")]
    BatchFailed {
        failed: usize,
        total: usize,
        details: String,
    },

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A logger was already installed
    #[error("Logging already initialized: {0}")]
    Logging(#[from] log::SetLoggerError),
}
