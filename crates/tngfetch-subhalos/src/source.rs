//! Where the pipeline reads from

use serde_json::Value;
use tngfetch_api::{ApiError, Client, Snapshot};

/// Remote collection the pipeline resolves and pages through.
///
/// Implemented by the HTTP [`Client`]; tests substitute in-memory sources.
pub trait CollectionSource: Sync {
    fn resolve(&self, simulation: &str, snapshot: u32) -> Result<Snapshot, ApiError>;

    /// Raw `results` of one page.
    fn fetch_page(&self, url: &str) -> Result<Vec<Value>, ApiError>;
}

impl CollectionSource for Client {
    fn resolve(&self, simulation: &str, snapshot: u32) -> Result<Snapshot, ApiError> {
        Client::resolve(self, simulation, snapshot)
    }

    fn fetch_page(&self, url: &str) -> Result<Vec<Value>, ApiError> {
        Client::fetch_page(self, url).map(|page| page.results)
    }
}
