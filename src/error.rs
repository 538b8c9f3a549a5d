//! Error taxonomy for the scanner.
//!
//! Only [`ScannerError::Fatal`] is allowed to abort the process. Every
//! other kind is produced, logged, and converted into a typed absence by
//! the worker that encountered it; it never crosses a worker boundary
//! except as data.

use std::fmt;

/// Structured failure from a single venue adapter call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("venue error ({kind:?}): {message}")]
pub struct VenueError {
    pub kind: VenueErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueErrorKind {
    Timeout,
    Transport,
    Parse,
    RateLimited,
    HttpError,
}

impl VenueError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::Timeout,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::Transport,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::Parse,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::RateLimited,
            message: message.into(),
            http_status: Some(429),
        }
    }

    pub fn http_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::HttpError,
            message: message.into(),
            http_status: Some(status),
        }
    }

    /// Classify a reqwest failure without ever panicking the caller.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_decode() {
            Self::parse(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

/// Failure reading or writing the shared keyed state store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("state store unavailable: {0}")]
pub struct StateStoreError(pub String);

/// A record that violated a data invariant at ingest (e.g. bid > ask).
#[derive(Debug, Clone, thiserror::Error)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

/// A signal suppressed by policy rather than by data quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRejectReason {
    Blacklisted,
    Cooldown,
    Duplicate,
}

impl fmt::Display for PolicyRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyRejectReason::Blacklisted => "blacklisted",
            PolicyRejectReason::Cooldown => "cooldown",
            PolicyRejectReason::Duplicate => "duplicate",
        };
        write!(f, "{s}")
    }
}

/// Notification transport failure; retried with backoff by the alert gate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Configuration or boot-time failure. The only kind allowed to abort the process.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("fatal: {0}")]
    Fatal(String),
    #[error(transparent)]
    StateStore(#[from] StateStoreError),
}
