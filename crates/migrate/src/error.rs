//! Error types for the migration runner and schema validator
//!
//! Infrastructure failures (database unreachable, files unreadable, broken
//! migration sets, failed scripts) are errors. Schema mismatches found by the
//! validator are not: they are reported inside a `ValidationResult`.

use std::path::PathBuf;
use strata_core::ConfigError;
use thiserror::Error;

use crate::schema::SchemaParseError;

/// Result type alias for migration and validation operations
pub type MigrateResult<T> = Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Database could not be reached (connect, TLS, I/O, pool exhaustion)
    #[error("Connectivity error: {0}")]
    Connectivity(sqlx::Error),

    /// A file or directory could not be read or written
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The migration directory breaks the naming or ordering rules
    #[error("Invalid migration set: {0}")]
    InvalidMigrationSet(String),

    #[error("Migration {version} ({name}) failed to apply: {reason}")]
    MigrationApply {
        version: i64,
        name: String,
        reason: String,
    },

    #[error("Migration {version} failed to roll back: {reason}")]
    MigrationRollback { version: i64, reason: String },

    /// A previous step was interrupted; an operator must run `force`
    #[error("Database is dirty at version {version}; fix the schema by hand and force a clean version")]
    Dirty { version: i64 },

    #[error("Schema parse error in {}: {source}", file.display())]
    SchemaParse {
        file: PathBuf,
        #[source]
        source: SchemaParseError,
    },

    #[error("No expected-schema files found for domain '{0}'")]
    UnknownDomain(String),

    /// Unexpected query failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that mean the database or filesystem is unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(self, MigrateError::Connectivity(_) | MigrateError::Io { .. })
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => MigrateError::Connectivity(err),
            other => MigrateError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_errors_are_classified() {
        assert!(MigrateError::from(sqlx::Error::PoolTimedOut).is_connectivity());
        assert!(MigrateError::from(sqlx::Error::PoolClosed).is_connectivity());
        assert!(!MigrateError::from(sqlx::Error::RowNotFound).is_connectivity());
    }

    #[test]
    fn test_error_messages() {
        let err = MigrateError::MigrationApply {
            version: 3,
            name: "add_posts".to_string(),
            reason: "relation \"users\" does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 3 (add_posts) failed to apply: relation \"users\" does not exist"
        );

        let err = MigrateError::io(
            "migrations/content",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("migrations/content"));
        assert!(err.is_connectivity());
    }
}
