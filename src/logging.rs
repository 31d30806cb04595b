//! Logger setup for the CLI.
//!
//! Uses `env_logger` behind the `log` facade. Lines look like
//! `2012-03-02 10:00:00,123 - INFO - message` and are optionally copied into
//! `logs/preprocess_<timestamp>.log`.

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::paths::DataLayout;
use env_logger::{Builder, Env, Target};
use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes every log line to stderr and to a file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Log file name for a run started now.
pub fn log_file_name(name: &str) -> String {
    format!(
        "{}_{}.log",
        name,
        chrono::Local::now().format("%Y.%m.%d_%H:%M:%S")
    )
}

/// Installs the global logger.
///
/// `RUST_LOG` overrides `config.level`. Returns the log file path when file
/// logging is enabled.
pub fn init_logging(config: &LoggingConfig, layout: &DataLayout) -> Result<Option<PathBuf>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(config.level.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            record.level(),
            record.args()
        )
    });

    let log_file = if config.file {
        let dir = layout.logs_dir();
        DataLayout::ensure_dir(&dir)?;
        let path = dir.join(log_file_name("preprocess"));
        builder.target(Target::Pipe(Box::new(TeeWriter {
            file: File::create(&path)?,
        })));
        Some(path)
    } else {
        None
    };

    builder.try_init()?;

    match &log_file {
        Some(path) => info!("Logging initialized. Log file: {}", path.display()),
        None => info!("Logging initialized"),
    }
    Ok(log_file)
}

/// Returns `true` if `path` looks like a file written by [`init_logging`].
pub fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("preprocess_") && n.ends_with(".log"))
        .unwrap_or(false)
}
