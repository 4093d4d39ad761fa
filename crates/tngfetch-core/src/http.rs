//! Shared HTTP client and tokio runtime.
//!
//! Requests are made with async reqwest on a small shared runtime, but every
//! caller sees a blocking interface so rayon workers can call it directly.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout for JSON API calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Whole-request timeout for cutout downloads, which can run to gigabytes.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(16)
        .user_agent(concat!("tngfetch/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
///
/// Never call `block_on` on this from inside another tokio runtime.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tngfetch-http")
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
