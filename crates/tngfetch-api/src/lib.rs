//! tngfetch API - blocking client for the IllustrisTNG REST API
//!
//! Wraps the base URL and API key into authenticated GETs against simulation,
//! snapshot and subhalo endpoints, and classifies failures into an error
//! taxonomy the pipeline can act on (retry, fail the window, abort the run).

pub mod client;
pub mod error;
pub mod snapshot;

// Re-exports
pub use client::{Client, DEFAULT_BASE_URL, Page};
pub use error::ApiError;
pub use snapshot::{SUBHALO_COUNT_KEY, Snapshot};
