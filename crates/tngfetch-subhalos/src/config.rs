//! Subhalo pipeline configuration

use std::path::PathBuf;

use tngfetch_core::RetryPolicy;

/// Records per request unless overridden.
pub const DEFAULT_GROUP_SIZE: u64 = 1000;

/// Pool size when threading is requested without an explicit count.
pub const DEFAULT_THREADED_WORKERS: usize = 8;

/// Runtime configuration for one fetch-and-persist run
#[derive(Debug, Clone)]
pub struct Config {
    pub simulation: String,
    pub snapshot: u32,
    /// SQLite database file
    pub output: PathBuf,
    /// Keep only records with `mass_log_msun >= threshold`
    pub mass_threshold: Option<f64>,
    /// Worker pool size (1 = sequential)
    pub workers: usize,
    /// Records per window
    pub group_size: u64,
    pub retry: RetryPolicy,
}

impl Config {
    /// Sequential run with defaults, writing to `{cwd}/{simulation}-SHDB.db`.
    pub fn new(simulation: impl Into<String>, snapshot: u32) -> Self {
        let simulation = simulation.into();
        Self {
            output: default_output(&simulation),
            simulation,
            snapshot,
            mass_threshold: None,
            workers: 1,
            group_size: DEFAULT_GROUP_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.simulation.trim().is_empty() {
            return Err("simulation name is empty".into());
        }
        if self.group_size == 0 {
            return Err("group size must be at least 1".into());
        }
        if self.workers == 0 {
            return Err("worker count must be at least 1".into());
        }
        if let Some(t) = self.mass_threshold {
            if !t.is_finite() {
                return Err(format!("mass threshold must be finite, got {t}"));
            }
        }
        Ok(())
    }
}

/// `{cwd}/{simulation}-SHDB.db`
pub fn default_output(simulation: &str) -> PathBuf {
    let name = format!("{simulation}-SHDB.db");
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(name),
        Err(_) => PathBuf::from(name),
    }
}
