//! tngfetch core - shared infrastructure for the TNG fetch tools
//!
//! HTTP runtime, logging, progress display and retry policy used by the API
//! client, the subhalo pipeline and the CLI.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;

// Re-exports for convenience
pub use http::{SHARED_RUNTIME, http_client};
pub use logging::{LogOptions, LogStream, TngLogger, console_logs_errors, init_logging};
pub use progress::{DisplayOptions, ProgressContext, SharedProgress, fmt_num};
pub use retry::{Retryable, RetryPolicy, retry_with_backoff};
