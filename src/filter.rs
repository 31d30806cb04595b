//! Per-company extraction from the raw transaction source.
//!
//! The source is far larger than memory, so it is streamed through the csv
//! reader in bounded chunks and only the matching rows are kept. Matches are
//! cached on disk per company so later runs skip the scan.

use crate::error::{PreprocessError, Result};
use crate::paths::DataLayout;
use crate::transaction::TransactionRecord;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use flate2::read::GzDecoder;
use log::{debug, error, info};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Default number of rows per scan chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Name of the column holding the retailer id.
const COMPANY_COLUMN: &str = "company";

/// Rows of one company, with the source header they were read under.
#[derive(Debug, Clone, Default)]
pub struct CompanyRows {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    /// Number of chunks the scan went through.
    pub chunks: usize,
}

/// Extracts one company's transactions from the raw source.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    layout: DataLayout,
    chunk_size: usize,
}

impl TransactionFilter {
    /// Creates a filter. A `chunk_size` of zero is treated as one.
    pub fn new(layout: DataLayout, chunk_size: usize) -> Self {
        TransactionFilter {
            layout,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Returns every transaction of `company`.
    ///
    /// Reads the per-company cache when present; otherwise scans the source
    /// and writes the cache before returning.
    pub fn load(&self, company: &str) -> Result<Vec<TransactionRecord>> {
        let cache = self.layout.filtered_file(company);

        let records = if cache.is_file() {
            info!(
                "Loading existing filtered data for company {} from {}",
                company,
                cache.display()
            );
            read_transactions(File::open(&cache)?)?
        } else {
            let source = self.layout.source();
            if !source.is_file() {
                let err = PreprocessError::SourceNotFound {
                    path: source.to_path_buf(),
                };
                error!("{}", err);
                return Err(err);
            }

            info!(
                "Filtering transactions for company {} from {}",
                company,
                source.display()
            );
            let matched = self.scan(open_source(source)?, company)?;
            if matched.rows.is_empty() {
                let err = PreprocessError::NoTransactions {
                    company: company.to_string(),
                };
                error!("{}", err);
                return Err(err);
            }

            DataLayout::ensure_dir(&self.layout.filtered_dir())?;
            info!(
                "Saving filtered data for company {} to {}",
                company,
                cache.display()
            );
            write_rows(&cache, &matched)?;

            matched
                .rows
                .iter()
                .map(|row| row.deserialize(Some(&matched.headers)))
                .collect::<std::result::Result<Vec<TransactionRecord>, csv::Error>>()?
        };

        info!("Loaded {} transactions for company {}", records.len(), company);
        Ok(records)
    }

    /// Streams `reader` chunk by chunk and keeps the rows of `company`.
    ///
    /// Fails with `MissingField` if the header has no `company` column.
    pub fn scan<R: Read>(&self, reader: R, company: &str) -> Result<CompanyRows> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let company_idx = headers
            .iter()
            .position(|h| h == COMPANY_COLUMN)
            .ok_or(PreprocessError::MissingField {
                field: COMPANY_COLUMN,
                row: 1,
            })?;

        let mut matched = CompanyRows {
            headers,
            ..Default::default()
        };
        let mut chunk: Vec<StringRecord> = Vec::with_capacity(self.chunk_size);
        let mut record = StringRecord::new();

        loop {
            let more = csv_reader.read_record(&mut record)?;
            if more {
                chunk.push(record.clone());
            }

            if chunk.len() == self.chunk_size || (!more && !chunk.is_empty()) {
                matched.chunks += 1;
                let before = matched.rows.len();
                matched.rows.extend(
                    chunk
                        .drain(..)
                        .filter(|row| row.get(company_idx) == Some(company)),
                );
                debug!(
                    "Chunk {}: {} rows matched company {}",
                    matched.chunks,
                    matched.rows.len() - before,
                    company
                );
            }

            if !more {
                break;
            }
        }

        Ok(matched)
    }
}

/// Opens the raw source, decompressing `.gz` files on the fly.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads transaction records from CSV.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<TransactionRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let records = csv_reader
        .deserialize::<TransactionRecord>()
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    Ok(records)
}

/// Path the cache is staged under before it is renamed into place.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the cache to a sibling temp file and renames it over `path`, so an
/// interrupted run never leaves a truncated cache behind.
fn write_rows(path: &Path, matched: &CompanyRows) -> Result<()> {
    let tmp_path = staging_path(path);
    if let Err(e) = write_staged(&tmp_path, matched) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_staged(tmp_path: &Path, matched: &CompanyRows) -> Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_path(tmp_path)?;
    writer.write_record(&matched.headers)?;
    for row in &matched.rows {
        writer.write_record(row)?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| PreprocessError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
