//! Centralized error handling for the biodata application.
//!
//! Most fallible code in this crate returns `anyhow::Result` with `.context`
//! attached at the call site. The enum below exists for the handful of cases
//! the CLI driver has to tell apart: a fatal configuration error (exit), an
//! explicit user abort (clean exit), and everything else.

use std::fmt;

/// Main error type for biodata operations.
#[derive(Debug)]
pub enum BiodataError {
    /// I/O errors (file operations, terminal input)
    Io(std::io::Error),

    /// Data processing errors (Polars, reshaping, parsing)
    DataProcessing(String),

    /// Configuration errors (`.bd` files, invalid graph types)
    Config(String),

    /// File not found or invalid path
    InvalidPath(String),

    /// Operation aborted by user (wizard quit)
    Aborted,

    /// Generic error with context
    Other(String),
}

impl fmt::Display for BiodataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::Aborted => write!(f, "Operation aborted by user"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BiodataError {}

impl From<std::io::Error> for BiodataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<polars::error::PolarsError> for BiodataError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<serde_json::Error> for BiodataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

/// Result type alias for biodata operations.
pub type Result<T> = std::result::Result<T, BiodataError>;

/// Returns true when `err` is (or wraps) a user abort.
///
/// The wizard signals "q"/EOF by bubbling [`BiodataError::Aborted`] through
/// `anyhow`; the binary uses this to exit cleanly instead of reporting a
/// failure.
pub fn is_abort(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<BiodataError>(), Some(BiodataError::Aborted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BiodataError::DataProcessing("column not found".to_owned());
        assert_eq!(err.to_string(), "Data processing error: column not found");
    }

    #[test]
    fn test_abort_detection() {
        let err: anyhow::Error = BiodataError::Aborted.into();
        assert!(is_abort(&err));

        let err: anyhow::Error = BiodataError::Config("bad".to_owned()).into();
        assert!(!is_abort(&err));
    }
}
