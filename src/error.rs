//! Error types for loading, checking and persisting galaxy data

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while importing or exporting a document
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unexpected input for one entity
    #[error("Failed to decode {entity} {key}: {message}")]
    Decode {
        entity: &'static str,
        key: String,
        message: String,
    },

    /// An update tried to move an entity's as-of timestamp backwards
    #[error(
        "Update uses outdated data for {entity} {key}: stored={stored}, incoming={incoming}"
    )]
    Monotonicity {
        entity: &'static str,
        key: String,
        stored: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },

    /// The store rejected a duplicate natural key
    #[error("Duplicate {table} key {key}")]
    Uniqueness { table: &'static str, key: String },

    /// Applying one document ran past its budget
    #[error("Import of {key} exceeded its {budget:?} budget")]
    Timeout { key: String, budget: Duration },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The table registry is inconsistent
    #[error("Schema error: {0}")]
    Schema(String),
}

impl Error {
    pub fn decode(entity: &'static str, key: impl ToString, message: impl Into<String>) -> Self {
        Error::Decode {
            entity,
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Whether the batch importer may retry the whole document.
    ///
    /// Only storage/transport trouble qualifies; bad data stays bad.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Attach a natural key to a decode error raised deeper in the tree
    /// that did not know which entity it belonged to.
    pub fn within(self, entity: &'static str, key: impl ToString) -> Self {
        match self {
            Error::Decode {
                entity: inner,
                key: inner_key,
                message,
            } if inner_key.is_empty() => Error::Decode {
                entity,
                key: key.to_string(),
                message: format!("{}: {}", inner, message),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monotonicity_message_names_entity_and_times() {
        let err = Error::Monotonicity {
            entity: "System",
            key: "id64=1".to_string(),
            stored: Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap(),
            incoming: Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("System id64=1"));
        assert!(msg.contains("1970-01-01 00:00:01"));
        assert!(msg.contains("1970-01-01 00:00:00"));
    }

    #[test]
    fn test_only_busy_storage_is_retryable() {
        let busy = Error::Storage(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(busy.is_retryable());
        assert!(!Error::decode("Body", "id64=3", "missing name").is_retryable());
        assert!(!Error::Uniqueness {
            table: "faction",
            key: "Alpha".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_within_fills_missing_key() {
        let err = Error::decode("Parent", "", "expected a single entry").within("Body", "id64=9");
        match err {
            Error::Decode { entity, key, message } => {
                assert_eq!(entity, "Body");
                assert_eq!(key, "id64=9");
                assert!(message.starts_with("Parent:"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
