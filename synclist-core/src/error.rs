use crate::types::{EntityKind, RecordId};

/// Top-level SyncList error type.
///
/// All fallible operations in `synclist-core` return [`Result<T, SyncListError>`](Result).
/// Callers at the HTTP boundary match on the variant to pick a status code.
#[derive(thiserror::Error, Debug)]
pub enum SyncListError {
    /// The requested record does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of the missing record.
        kind: EntityKind,
        /// Identifier that was looked up.
        id: RecordId,
    },

    /// Input was rejected before reaching the store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Error from the record store layer.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncListError {
    /// Whether the failure was caused by bad input rather than by the engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Store(StoreError::Constraint(_))
        )
    }

    /// Whether the failure means the addressed record is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Store(StoreError::RecordNotFound { .. })
        )
    }
}

/// Errors from the SQLite-backed record store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema constraint (NOT NULL, CHECK) rejected the row.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// An update addressed a row that no longer exists.
    #[error("{kind} {id} does not exist")]
    RecordNotFound {
        /// Kind of the missing row.
        kind: EntityKind,
        /// Identifier of the missing row.
        id: RecordId,
    },

    /// A filter named a column the addressed table does not have.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The store handed back a row of a different kind than was asked for.
    #[error("Unexpected {0} row")]
    UnexpectedKind(EntityKind),

    /// Schema bootstrap failed.
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Classify a raw `SQLite` error, splitting out constraint violations.
    pub fn classify(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::Constraint(err.to_string()),
            _ => Self::Sqlite(err),
        }
    }
}

/// Errors in SyncList configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Convenience alias for `Result<T, SyncListError>`.
pub type Result<T> = std::result::Result<T, SyncListError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_errors_count_as_validation() {
        let err = SyncListError::Store(StoreError::Constraint("CHECK failed".into()));
        assert!(err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn record_not_found_counts_as_not_found() {
        let err = SyncListError::Store(StoreError::RecordNotFound {
            kind: EntityKind::Item,
            id: RecordId(7),
        });
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Store error: Item 7 does not exist");
    }

    #[test]
    fn classify_keeps_non_constraint_errors() {
        let err = StoreError::classify(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
