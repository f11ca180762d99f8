//! Error types for the data access layer.

use thiserror::Error;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum DataError {
    /// Migration execution failed.
    #[error("migration failed")]
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    #[error("database operation failed")]
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A stored value could not be mapped onto its domain type.
    #[error("stored value could not be decoded")]
    InvalidValue {
        /// Column holding the value.
        column: &'static str,
        /// Offending value.
        value: String,
    },
}

pub(crate) fn query_failed(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());

        let query = query_failed("fetch")(sqlx::Error::RowNotFound);
        assert_eq!(query.to_string(), "database operation failed");
        assert!(query.source().is_some());

        let invalid = DataError::InvalidValue {
            column: "status",
            value: "bogus".into(),
        };
        assert!(invalid.source().is_none());
    }
}
