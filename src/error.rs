//! Error types for tierstore

use std::fmt;

/// Result type alias for tierstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tierstore
#[derive(Debug)]
pub enum Error {
    /// Metric or metadata record absent
    NotFound(String),
    /// Metric already has a metadata record
    AlreadyExists(String),
    /// From-time after until-time
    InvalidRange { from: u32, until: u32 },
    /// Backing store failure, propagated unchanged
    Store(String),
    /// Serialization errors
    Serialization(String),
    /// Malformed stored bytes (slot record or metadata)
    Corrupt(String),
    /// Configuration errors
    Config(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(metric) => write!(f, "No such metric: {}", metric),
            Error::AlreadyExists(metric) => write!(f, "Metric already exists: {}", metric),
            Error::InvalidRange { from, until } => {
                write!(
                    f,
                    "Invalid time interval: from time '{}' is after until time '{}'",
                    from, until
                )
            }
            Error::Store(msg) => write!(f, "Store error: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Corrupt(msg) => write!(f, "Corrupt record: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
