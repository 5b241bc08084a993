//! Unified error types for the offline cache.
//!
//! Every variant renders with a stable upper-case code prefix so log lines
//! and CLI output can be matched without parsing free text.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty locator).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Invalid URL or locator.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network unreachable, DNS failure, connection reset.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Precaching a manifest resource failed.
    #[error("INSTALL_FAILED: {locator}: {reason}")]
    InstallFailed { locator: String, reason: String },

    /// Lifecycle event dispatched in the wrong worker state.
    #[error("INVALID_STATE: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => "CACHE_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Network(_) => "NETWORK_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::InstallFailed { .. } => "INSTALL_FAILED",
            Error::InvalidState { .. } => "INVALID_STATE",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CorruptEntry("https://example.com/: bad headers".to_string());
        assert!(err.to_string().starts_with("CACHE_ERROR: corrupt entry"));
        assert!(err.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_install_failed_display() {
        let err = Error::InstallFailed { locator: "/app.js".into(), reason: "status 404".into() };
        assert_eq!(err.to_string(), "INSTALL_FAILED: /app.js: status 404");
        assert_eq!(err.code(), "INSTALL_FAILED");
    }

    #[test]
    fn test_code_matches_display_prefix() {
        let errors = [
            Error::Network("offline".into()),
            Error::FetchTimeout("20s".into()),
            Error::MigrationFailed("bad".into()),
            Error::InvalidUrl("::".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }
}
