//! Typed subhalo records and the mass filter

use serde::Deserialize;
use serde_json::Value;

/// One subhalo row as listed by `/snapshots/{n}/subhalos/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubhaloRecord {
    pub id: i64,
    /// Star formation rate [Msun/yr]
    pub sfr: f64,
    /// Total mass, log10(Msun)
    pub mass_log_msun: f64,
    pub url: String,
}

impl SubhaloRecord {
    /// Inclusive lower bound on `mass_log_msun`; no threshold keeps everything.
    pub fn passes(&self, threshold: Option<f64>) -> bool {
        threshold.map_or(true, |t| self.mass_log_msun >= t)
    }
}

/// A page element that is not a valid subhalo record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordParseError {
    /// Position in the page's `results` array
    pub index: usize,
    /// Record id, when it could be read
    pub id: Option<i64>,
    pub message: String,
}

impl std::fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "record {} (id {id}): {}", self.index, self.message),
            None => write!(f, "record {}: {}", self.index, self.message),
        }
    }
}

impl std::error::Error for RecordParseError {}

/// Decode one element of a page.
pub fn decode_record(index: usize, value: &Value) -> Result<SubhaloRecord, RecordParseError> {
    SubhaloRecord::deserialize(value).map_err(|e| RecordParseError {
        index,
        id: value.get("id").and_then(Value::as_i64),
        message: e.to_string(),
    })
}

/// Decode a whole page; the first bad element fails the page.
pub fn decode_page(values: &[Value]) -> Result<Vec<SubhaloRecord>, RecordParseError> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| decode_record(i, v))
        .collect()
}
