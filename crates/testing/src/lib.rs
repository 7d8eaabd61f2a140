//! # strata-testing - Test support for strata
//!
//! Utilities for database-backed tests of migrations and schema validation:
//!
//! - **Readiness**: an explicit precondition deciding whether a database is
//!   available, so tests skip instead of failing on machines without one
//! - **Isolated schemas**: every [`TestDatabase`] works in its own freshly
//!   created PostgreSQL schema and drops it on cleanup
//! - **Assertions**: table and column checks against that schema
//! - **Fixtures**: migration and schema files in temporary directories
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strata_testing::prelude::*;
//!
//! # async fn example() -> TestResult<()> {
//! let Some(db) = TestDatabase::try_new().await else {
//!     return Ok(()); // no database, skip
//! };
//! db.execute("CREATE TABLE posts (id INT)").await?;
//! db.assertions().assert_table_exists("posts").await?;
//! db.cleanup().await?;
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod database;
pub mod fixtures;
pub mod readiness;

pub use assertions::SchemaAssertions;
pub use database::TestDatabase;
pub use fixtures::MigrationFixture;
pub use readiness::{check_readiness, Readiness, ReadinessContext};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        assertions::SchemaAssertions,
        database::TestDatabase,
        fixtures::MigrationFixture,
        readiness::{check_readiness, Readiness, ReadinessContext},
        utils, TestError, TestResult,
    };
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("Test setup error: {0}")]
    Setup(String),
}

pub type TestResult<T> = Result<T, TestError>;

/// Test utilities and helper functions
pub mod utils {
    use rand::Rng;

    /// Generate a random lowercase alphanumeric string with optional prefix
    pub fn random_string(prefix: Option<&str>) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(8)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        match prefix {
            Some(p) => format!("{}_{}", p, suffix),
            None => suffix,
        }
    }

    /// Name usable as a PostgreSQL schema or table name
    pub fn unique_identifier(prefix: &str) -> String {
        random_string(Some(prefix))
    }

}
