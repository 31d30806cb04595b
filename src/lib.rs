//! # LTV Preprocess
//!
//! Turns a raw retail transaction log into per-customer features for
//! lifetime-value modeling, one company at a time.
//!
//! ## Design Principles
//!
//! - **Calibration / holdout split**: a customer's first purchase day is the
//!   calibration period; the following 365 days are the holdout (label) window
//! - **Exact money**: amounts are summed as `rust_decimal` values
//! - **Pure core**: [`CustomerAggregator`] has no side effects and reports
//!   progress through an [`AggregationObserver`]
//! - **Streaming scan**: the raw source is filtered in bounded chunks and
//!   cached per company
//! - **Isolated companies**: companies run in parallel and fail independently
//!
//! ## Example
//!
//! ```
//! use ltv_preprocess::{AggregatorConfig, CustomerAggregator, TransactionRecord};
//!
//! let records = vec![
//!     TransactionRecord::new("1", "2012-03-02", "10.0").with_category("707"),
//!     TransactionRecord::new("1", "2012-04-02", "2.5"),
//! ];
//! let customers = CustomerAggregator::new(AggregatorConfig::default())
//!     .aggregate(&records)
//!     .unwrap();
//! assert_eq!(customers[0].holdout_value.to_string(), "2.5");
//! assert_eq!(customers[0].category, "707");
//! ```

pub mod aggregator;
pub mod amount;
pub mod config;
pub mod customer;
pub mod error;
pub mod filter;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod transaction;

pub use aggregator::{
    AggregationObserver, AggregatorConfig, CustomerAggregator, LogObserver, NoopObserver,
    PartitionSummary, DEFAULT_HOLDOUT_DAYS,
};
pub use amount::Amount;
pub use config::{LoggingConfig, PipelineConfig};
pub use customer::{write_customers, CustomerRecord, CUSTOMER_HEADERS, UNKNOWN};
pub use error::{PreprocessError, Result};
pub use filter::{read_transactions, CompanyRows, TransactionFilter, DEFAULT_CHUNK_SIZE};
pub use logging::init_logging;
pub use paths::DataLayout;
pub use pipeline::{run_batch, BatchSummary, CompanyOutcome, CompanyReport, Pipeline};
pub use transaction::{Attributes, Transaction, TransactionRecord};
