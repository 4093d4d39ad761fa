//! Resolved snapshot metadata

use serde_json::{Map, Value};

/// Attribute holding the number of subfind subhalos in a snapshot.
pub const SUBHALO_COUNT_KEY: &str = "num_groups_subfind";

/// A simulation snapshot as returned by `/{simulation}/snapshots/{n}/`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub attributes: Map<String, Value>,
    pub api_url: String,
}

impl Snapshot {
    pub fn new(attributes: Map<String, Value>, api_url: impl Into<String>) -> Self {
        Self {
            attributes,
            api_url: api_url.into(),
        }
    }

    /// Non-negative integer attribute. Integral floats (`2500.0`) are accepted.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let v = self.attributes.get(key)?;
        v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key)?.as_f64()
    }

    /// Total subhalos in this snapshot.
    pub fn subhalo_count(&self) -> Option<u64> {
        self.get_u64(SUBHALO_COUNT_KEY)
    }

    pub fn number(&self) -> Option<u64> {
        self.get_u64("number")
    }

    pub fn redshift(&self) -> Option<f64> {
        self.get_f64("redshift")
    }

    /// Paginated subhalo collection URL.
    ///
    /// Uses the `subhalos` link when the API provides one, otherwise derives
    /// it from the snapshot URL.
    pub fn subhalos_url(&self) -> String {
        match self.attributes.get("subhalos").and_then(Value::as_str) {
            Some(url) => url.to_string(),
            None => format!("{}/subhalos/", self.api_url.trim_end_matches('/')),
        }
    }
}
