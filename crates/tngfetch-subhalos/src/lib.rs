//! Subhalo catalogue builder
//!
//! Pages through a snapshot's subhalo collection in fixed-size windows,
//! optionally filters on `mass_log_msun` and writes the rows to a SQLite table
//! `SHID_{simulation}_{snapshot}`. Windows are processed by a rayon worker
//! pool; each worker owns its own SQLite connection.

pub mod config;
pub mod error;
pub mod queue;
pub mod record;
pub mod runner;
pub mod source;
pub mod stats;
pub mod store;
pub mod window;
pub mod worker;

pub use config::{Config, DEFAULT_GROUP_SIZE, DEFAULT_THREADED_WORKERS, default_output};
pub use error::{PipelineError, WindowError};
pub use record::{RecordParseError, SubhaloRecord};
pub use runner::{run, run_with_interrupt};
pub use source::CollectionSource;
pub use stats::{Stage, Summary, WindowFailure, WindowReport};
pub use store::{Store, table_name};
pub use window::{Window, plan_windows};
