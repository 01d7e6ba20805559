//! Plan store error types

use rusqlite::ErrorCode;
use thiserror::Error;

/// Plan store error type
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying SQLite failure (conflict, unavailability, corruption)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Plan blob could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Plan ids are positive and must fit the integer key column
    #[error("invalid plan id: {0}")]
    InvalidPlanId(u64),

    /// Operation attempted after `close()`
    #[error("plan store is closed")]
    Closed,

    /// Rejected configuration
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is a transient store conflict (busy or locked)
    ///
    /// Transient failures inside a pruning run are logged and left for the
    /// next pass instead of aborting the run.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Plan store result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_is_transient() {
        let err = Error::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_other_errors_are_not_transient() {
        assert!(!Error::Closed.is_transient());
        assert!(!Error::InvalidPlanId(0).is_transient());
        let err = Error::Database(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_transient());
    }
}
