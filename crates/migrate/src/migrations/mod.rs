//! Migration System
//!
//! Versioned `up`/`down` SQL scripts per domain, a version table tracking
//! what has been applied, and a runner that applies and rolls back scripts
//! under a PostgreSQL advisory lock.

pub mod definitions;
pub mod manager;
pub mod rollback;
pub mod runner;
pub mod tracking;

pub use definitions::*;
pub use manager::MigrationManager;
pub use runner::MigrationRunner;
pub use tracking::VersionTable;
