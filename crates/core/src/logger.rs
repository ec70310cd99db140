//! Log stream setup
//!
//! Records go to stderr and, once a project store exists, to a plain text
//! log file inside it that external callers tail or drain.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name of the log file inside the project store
pub const LOG_FILE_NAME: &str = "logs.log";

/// Where log records are written
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Emit records on stderr
    pub terminal: bool,
    /// Append records to this file
    pub log_file: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            terminal: true,
            log_file: None,
            default_filter: "info".to_string(),
        }
    }
}

impl LogOptions {
    /// Also write to the log file of the store at `store_dir`
    ///
    /// The store does not have to exist yet: records are dropped until it
    /// does, so `init` logs into the store it creates.
    pub fn with_store(mut self, store_dir: &Path) -> Self {
        self.log_file = Some(store_dir.join(LOG_FILE_NAME));
        self
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(options: LogOptions) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let terminal = options
        .terminal
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    let (file, guard) = match &options.log_file {
        Some(path) => {
            if path.file_name().is_none() {
                return Err(Error::InvalidArgument(format!("invalid log file {}", path.display())));
            }
            let (writer, guard) = tracing_appender::non_blocking(DeferredFile::new(path));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal)
        .with(file)
        .try_init()
        .map_err(|e| Error::InvalidArgument(format!("logger already initialized: {}", e)))?;

    Ok(guard)
}

/// Append-only log file opened on first write once its directory exists
struct DeferredFile {
    path: PathBuf,
    file: Option<File>,
}

impl DeferredFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    fn file(&mut self) -> io::Result<Option<&mut File>> {
        if self.file.is_none() && self.path.parent().map_or(false, Path::is_dir) {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut())
    }
}

impl Write for DeferredFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file()? {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
