//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system
//! including Migration, MigrationRecord and the run/rollback reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// A versioned migration loaded from a `<version>_<name>.up.sql` /
/// `<version>_<name>.down.sql` file pair
#[derive(Debug, Clone, Serialize)]
pub struct Migration {
    /// Numeric filename prefix
    pub version: i64,
    /// Filename part between the version and the direction suffix
    pub name: String,
    /// SQL statements to apply the migration
    pub up_sql: String,
    /// SQL statements to rollback the migration, if a down script exists
    pub down_sql: Option<String>,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

impl Migration {
    /// `0003_add_posts` style label used in logs
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}

/// Migrations sorted by ascending version without gaps
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    pub(crate) migrations: Vec<Migration>,
}

impl MigrationSet {
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    /// Highest version in the set, 0 when empty
    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map_or(0, |m| m.version)
    }

    /// Migrations with a version above `current`, ascending
    pub fn pending_after(&self, current: i64) -> impl Iterator<Item = &Migration> {
        self.migrations.iter().filter(move |m| m.version > current)
    }
}

/// Row of the version table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// All migrations applied by one `migrate_up` call share a batch
    pub batch: i32,
    /// Set when a step was interrupted; blocks further migrations
    pub dirty: bool,
    pub applied_at: DateTime<Utc>,
}

/// Current position of a domain's migration history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionState {
    /// Highest recorded version, 0 when nothing was ever applied
    pub version: i64,
    pub dirty: bool,
}

impl VersionState {
    pub const EMPTY: VersionState = VersionState {
        version: 0,
        dirty: false,
    };
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        applied_at: DateTime<Utc>,
        batch: i32,
    },
    /// A step on this version was interrupted
    Dirty,
}

/// Result of running migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateReport {
    /// Versions applied by this call, ascending
    pub applied: Vec<i64>,
    /// Pending versions found already applied by a concurrent runner
    pub skipped: Vec<i64>,
    /// Batch number recorded for the applied versions
    pub batch: Option<i32>,
    /// Version after the run
    pub version: i64,
    pub execution_time_ms: u128,
}

impl MigrateReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    /// Versions rolled back, descending
    pub rolled_back: Vec<i64>,
    /// Version after the rollback
    pub version: i64,
    pub execution_time_ms: u128,
}

impl RollbackReport {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Rollback the migration (run DOWN statements)
    Down,
}

impl MigrationDirection {
    pub(crate) fn suffix(self) -> &'static str {
        match self {
            MigrationDirection::Up => "up",
            MigrationDirection::Down => "down",
        }
    }
}
