//! Window and pipeline errors

use tngfetch_api::ApiError;

use crate::record::RecordParseError;
use crate::stats::Summary;

/// Error from processing a single window (fetch + decode + insert).
#[derive(Debug)]
pub enum WindowError {
    Api(ApiError),
    Record(RecordParseError),
    Storage(rusqlite::Error),
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{e}"),
            Self::Record(e) => write!(f, "bad record: {e}"),
            Self::Storage(e) => write!(f, "SQLite: {e}"),
        }
    }
}

impl std::error::Error for WindowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Record(e) => Some(e),
            Self::Storage(e) => Some(e),
        }
    }
}

impl WindowError {
    /// A bad credential (or vanished snapshot) invalidates every window.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Api(e) => e.is_fatal(),
            Self::Record(_) | Self::Storage(_) => false,
        }
    }
}

impl From<ApiError> for WindowError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<RecordParseError> for WindowError {
    fn from(e: RecordParseError) -> Self {
        Self::Record(e)
    }
}

impl From<rusqlite::Error> for WindowError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e)
    }
}

/// Error that ends a pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    InvalidConfig(String),
    /// Simulation/snapshot could not be resolved
    Resolve(ApiError),
    /// Snapshot resolved but has no record count attribute
    MissingCount { key: &'static str, url: String },
    /// Destination table could not be created
    Storage(rusqlite::Error),
    Io(std::io::Error),
    ThreadPool(String),
    /// A worker hit a fatal error in `window`; `summary` covers what was
    /// written before the pool stopped
    Aborted { window: usize, summary: Box<Summary> },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Resolve(e) => write!(f, "cannot resolve simulation/snapshot: {e}"),
            Self::MissingCount { key, url } => {
                write!(f, "snapshot {url} has no '{key}' attribute")
            }
            Self::Storage(e) => write!(f, "cannot create output table: {e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::ThreadPool(msg) => write!(f, "cannot start worker pool: {msg}"),
            Self::Aborted { window, summary } => {
                write!(
                    f,
                    "aborted after {} of {} windows ({} rows written)",
                    summary.windows_completed, summary.windows_total, summary.rows_written
                )?;
                match summary.failure(*window) {
                    Some(failure) => write!(f, ": {}", failure.error),
                    None => Ok(()),
                }
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve(e) => Some(e),
            Self::Storage(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Aborted { window, summary } => summary
                .failure(*window)
                .map(|f| &f.error as &(dyn std::error::Error + 'static)),
            Self::InvalidConfig(_) | Self::MissingCount { .. } | Self::ThreadPool(_) => None,
        }
    }
}
