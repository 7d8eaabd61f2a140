//! # strata-migrate
//!
//! Versioned SQL migrations and declarative schema validation for
//! multi-domain PostgreSQL deployments.
//!
//! - [`MigrationRunner`] applies `<version>_<name>.up.sql` scripts and rolls
//!   them back with the paired `.down.sql`, one transaction per step under
//!   an advisory lock, with a dirty flag for interrupted steps.
//! - [`SchemaValidator`] compares expected-schema SQL files with the live
//!   database and reports mismatches as data, see [`generate_report`].

pub mod database;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod sql;

pub use database::{connect, ping, PoolConfig};
pub use error::{MigrateError, MigrateResult};
pub use migrations::{
    Migration, MigrationDirection, MigrationManager, MigrationRecord, MigrationRunner,
    MigrationSet, MigrationStatus, MigrateReport, RollbackReport, VersionState, VersionTable,
};
pub use schema::{
    diff_schemas, generate_report, parse_schema, ExpectedSchema, SchemaDiff, SchemaParseError,
    SchemaValidator, ValidationResult,
};
