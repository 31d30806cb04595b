//! Pipeline configuration loaded from a TOML file.
//!
//! ```toml
//! root = "."
//! source = "data/transactions.csv.gz"
//! chunk_size = 1000000
//! jobs = 4
//!
//! [companies]
//! active = [104900040, "10000"]
//!
//! [aggregation]
//! holdout_days = 365
//! count_returns = true
//!
//! [logging]
//! level = "info"
//! file = true
//! ```

use crate::aggregator::{holdout_window, AggregatorConfig, DEFAULT_HOLDOUT_DAYS};
use crate::error::{PreprocessError, Result};
use crate::filter::DEFAULT_CHUNK_SIZE;
use crate::paths::DataLayout;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Company ids may be written as integers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CompanyId {
    Number(u64),
    Text(String),
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompanyId::Number(n) => write!(f, "{}", n),
            CompanyId::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    root: Option<PathBuf>,
    source: Option<PathBuf>,
    chunk_size: Option<usize>,
    jobs: Option<usize>,
    companies: Option<TomlCompanies>,
    aggregation: Option<TomlAggregation>,
    logging: Option<TomlLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlCompanies {
    active: Option<Vec<CompanyId>>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlAggregation {
    holdout_days: Option<i64>,
    count_returns: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlLogging {
    level: Option<String>,
    file: Option<bool>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter; `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Also write a timestamped log file under the logs directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: true,
        }
    }
}

/// Fully resolved pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub chunk_size: usize,
    /// Worker count; `None` uses one per logical CPU.
    pub jobs: Option<usize>,
    pub companies: Vec<String>,
    pub aggregation: AggregatorConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Loads a config file. A relative `root` resolves against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base)
    }

    /// Parses config text, resolving a relative `root` against `base`.
    pub fn from_toml_str(text: &str, base: &Path) -> Result<Self> {
        let raw: TomlConfig = toml::from_str(text)?;

        let root = match raw.root {
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        };
        let mut layout = DataLayout::new(root);
        if let Some(source) = raw.source {
            layout = layout.with_source(source);
        }

        let chunk_size = raw.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(PreprocessError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }

        if raw.jobs == Some(0) {
            return Err(PreprocessError::InvalidConfig(
                "jobs must be positive".to_string(),
            ));
        }

        let aggregation = raw.aggregation.unwrap_or_default();
        let holdout_days = aggregation.holdout_days.unwrap_or(DEFAULT_HOLDOUT_DAYS);
        holdout_window(holdout_days)?;

        let companies: Vec<String> = raw
            .companies
            .and_then(|c| c.active)
            .unwrap_or_default()
            .iter()
            .map(CompanyId::to_string)
            .filter(|c| !c.is_empty())
            .collect();

        let logging = raw.logging.unwrap_or_default();
        let defaults = LoggingConfig::default();

        Ok(PipelineConfig {
            layout,
            chunk_size,
            jobs: raw.jobs,
            companies,
            aggregation: AggregatorConfig {
                holdout_days,
                count_returns: aggregation.count_returns.unwrap_or(true),
            },
            logging: LoggingConfig {
                level: logging.level.unwrap_or(defaults.level),
                file: logging.file.unwrap_or(defaults.file),
            },
        })
    }

    /// Replaces the configured companies, e.g. with ids from the command line.
    pub fn with_companies(mut self, companies: Vec<String>) -> Self {
        self.companies = companies;
        self
    }

    /// Fails when there is nothing to process.
    pub fn validate(&self) -> Result<()> {
        if self.companies.is_empty() {
            return Err(PreprocessError::InvalidConfig(
                "no companies to process; set companies.active or pass ids".to_string(),
            ));
        }
        Ok(())
    }
}
