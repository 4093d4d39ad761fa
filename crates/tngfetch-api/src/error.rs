//! Remote API error taxonomy

use tngfetch_core::Retryable;

/// Error from a single TNG API call.
///
/// The variant decides what the caller may do next: `Transient` is worth
/// retrying, `NotFound` and `Auth` end the whole run, everything else fails
/// only the request at hand.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP 404: the simulation, snapshot or subhalo does not exist upstream
    NotFound { url: String },
    /// HTTP 401/403: missing or rejected API key
    Auth { status: u16 },
    /// Network failure, timeout, HTTP 429 or 5xx
    Transient {
        status: Option<u16>,
        message: String,
    },
    /// Any other non-success status
    Http { status: u16, message: String },
    /// Body was not the JSON shape we expected
    Decode(String),
    /// Local I/O while saving a download
    Io(std::io::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { url } => write!(f, "not found: {url}"),
            Self::Auth { status } => write!(
                f,
                "HTTP {status}: API key missing or rejected (set one with `tngfetch apikey <KEY>`)"
            ),
            Self::Transient {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Transient {
                status: None,
                message,
            } => write!(f, "network error: {message}"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            404 => Self::NotFound {
                url: url.to_string(),
            },
            401 | 403 => Self::Auth { status },
            429 | 500..=599 => Self::Transient {
                status: Some(status),
                message: status_reason(status).to_string(),
            },
            _ => Self::Http {
                status,
                message: status_reason(status).to_string(),
            },
        }
    }

    /// Create from a reqwest error (connect/timeout/body errors carry no status).
    pub fn from_reqwest(e: &reqwest::Error, url: &str) -> Self {
        match e.status() {
            Some(s) => Self::from_status(s.as_u16(), url),
            None => Self::Transient {
                status: None,
                message: e.to_string(),
            },
        }
    }

    /// Errors that invalidate every other request of the same run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Auth { .. })
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

fn status_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status")
}
