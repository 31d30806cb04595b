//! On-disk layout of the dataset, caches, outputs and logs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default location of the raw source relative to the root.
pub const DEFAULT_SOURCE: &str = "data/transactions.csv.gz";

/// Resolves every path the pipeline touches from one root directory.
///
/// ```text
/// <root>/data/transactions.csv.gz
/// <root>/data/processed/transactions/transactions_company_<id>.csv
/// <root>/data/processed/customers/customer_level_data_company_<id>.csv
/// <root>/logs/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
    source: PathBuf,
}

impl DataLayout {
    /// Creates a layout with the default source location.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let source = root.join(DEFAULT_SOURCE);
        DataLayout { root, source }
    }

    /// Overrides the raw source path. Relative paths are resolved against the root.
    pub fn with_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = self.root.join(source);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn filtered_dir(&self) -> PathBuf {
        self.root.join("data").join("processed").join("transactions")
    }

    pub fn customers_dir(&self) -> PathBuf {
        self.root.join("data").join("processed").join("customers")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Cache of one company's raw rows.
    pub fn filtered_file(&self, company: &str) -> PathBuf {
        self.filtered_dir()
            .join(format!("transactions_company_{}.csv", company))
    }

    /// Customer feature output of one company.
    pub fn customers_file(&self, company: &str) -> PathBuf {
        self.customers_dir()
            .join(format!("customer_level_data_company_{}.csv", company))
    }

    /// Creates `dir` and its parents if missing.
    pub fn ensure_dir(dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let layout = DataLayout::new("/srv/ltv");
        assert_eq!(layout.source(), Path::new("/srv/ltv/data/transactions.csv.gz"));
        assert_eq!(
            layout.filtered_file("104900040"),
            PathBuf::from("/srv/ltv/data/processed/transactions/transactions_company_104900040.csv")
        );
        assert_eq!(
            layout.customers_file("10000"),
            PathBuf::from("/srv/ltv/data/processed/customers/customer_level_data_company_10000.csv")
        );
        assert_eq!(layout.logs_dir(), PathBuf::from("/srv/ltv/logs"));
    }

    #[test]
    fn test_source_override() {
        let relative = DataLayout::new("/srv/ltv").with_source("raw/sample.csv");
        assert_eq!(relative.source(), Path::new("/srv/ltv/raw/sample.csv"));

        let absolute = DataLayout::new("/srv/ltv").with_source("/mnt/transactions.csv");
        assert_eq!(absolute.source(), Path::new("/mnt/transactions.csv"));
    }
}
