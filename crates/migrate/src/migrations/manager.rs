//! Migration Manager - File system operations for migrations
//!
//! Loads `<version>_<name>.up.sql` / `<version>_<name>.down.sql` pairs from a
//! domain's migration directory, validates the set before anything touches
//! the database, and creates new migration file pairs.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::{Migration, MigrationDirection, MigrationSet};
use crate::error::{MigrateError, MigrateResult};
use crate::sql;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)_([A-Za-z0-9_\-]+)\.(up|down)\.sql$").expect("migration filename pattern")
});

/// One side of a migration pair as read from disk
struct ScriptFile {
    path: PathBuf,
    sql: String,
}

#[derive(Default)]
struct PartialMigration {
    name: String,
    up: Option<ScriptFile>,
    down: Option<ScriptFile>,
}

/// Migration manager for creating and loading migrations
#[derive(Debug, Clone)]
pub struct MigrationManager {
    migrations_dir: PathBuf,
}

impl MigrationManager {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Load and validate every migration in the directory.
    ///
    /// Fails with `InvalidMigrationSet` on malformed filenames, duplicate
    /// versions, orphan down scripts or gaps between versions.
    pub fn load(&self) -> MigrateResult<MigrationSet> {
        let dir = &self.migrations_dir;
        let entries = fs::read_dir(dir).map_err(|e| MigrateError::io(dir, e))?;

        let mut partials: BTreeMap<i64, PartialMigration> = BTreeMap::new();

        for entry in entries {
            let entry = entry.map_err(|e| MigrateError::io(dir, e))?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            if !path.is_file() || !file_name.ends_with(".sql") {
                tracing::trace!(file = %file_name, "ignoring non-migration file");
                continue;
            }

            let (version, name, direction) = parse_filename(&file_name)?;
            let sql = fs::read_to_string(&path).map_err(|e| MigrateError::io(&path, e))?;

            let partial = partials.entry(version).or_default();
            if partial.name.is_empty() {
                partial.name = name;
            } else if partial.name != name {
                return Err(MigrateError::InvalidMigrationSet(format!(
                    "version {} is used by two names: '{}' and '{}'",
                    version, partial.name, name
                )));
            }

            let slot = match direction {
                MigrationDirection::Up => &mut partial.up,
                MigrationDirection::Down => &mut partial.down,
            };
            if let Some(existing) = slot.as_ref() {
                return Err(MigrateError::InvalidMigrationSet(format!(
                    "duplicate {} script for version {}: {} and {}",
                    direction.suffix(),
                    version,
                    existing.path.display(),
                    path.display()
                )));
            }
            *slot = Some(ScriptFile { path, sql });
        }

        let mut migrations = Vec::with_capacity(partials.len());
        for (version, partial) in partials {
            let up = partial.up.ok_or_else(|| {
                MigrateError::InvalidMigrationSet(format!(
                    "version {} has a down script but no up script",
                    version
                ))
            })?;
            let (down_sql, down_path) = match partial.down {
                Some(down) => (Some(down.sql), Some(down.path)),
                None => (None, None),
            };

            migrations.push(Migration {
                version,
                name: partial.name,
                up_sql: up.sql,
                down_sql,
                up_path: up.path,
                down_path,
            });
        }

        check_contiguous(&migrations)?;

        tracing::debug!(
            dir = %dir.display(),
            count = migrations.len(),
            "loaded migration set"
        );

        Ok(MigrationSet { migrations })
    }

    /// Reject scripts the tokenizer cannot read before any of them runs
    pub fn precheck<'a, I>(&self, migrations: I, direction: MigrationDirection) -> MigrateResult<()>
    where
        I: IntoIterator<Item = &'a Migration>,
    {
        for migration in migrations {
            match direction {
                MigrationDirection::Up => {
                    sql::count_statements(&migration.up_sql).map_err(|e| {
                        MigrateError::MigrationApply {
                            version: migration.version,
                            name: migration.name.clone(),
                            reason: format!("{} does not parse: {}", migration.up_path.display(), e),
                        }
                    })?;
                }
                MigrationDirection::Down => {
                    let down_sql = migration.down_sql.as_deref().ok_or_else(|| {
                        MigrateError::MigrationRollback {
                            version: migration.version,
                            reason: format!("no down script for {}", migration.label()),
                        }
                    })?;
                    sql::count_statements(down_sql).map_err(|e| MigrateError::MigrationRollback {
                        version: migration.version,
                        reason: format!("down script does not parse: {}", e),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Create the next migration file pair, returning the up and down paths
    pub fn create_migration(&self, name: &str) -> MigrateResult<(PathBuf, PathBuf)> {
        let dir = &self.migrations_dir;
        fs::create_dir_all(dir).map_err(|e| MigrateError::io(dir, e))?;

        let slug = name.trim().replace(' ', "_").to_lowercase();
        let next_version = self.load()?.latest_version() + 1;
        let stem = format!("{:04}_{}", next_version, slug);

        // Validate the name with the same rule the loader applies
        parse_filename(&format!("{}.up.sql", stem))?;

        let created = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let up_path = dir.join(format!("{}.up.sql", stem));
        let down_path = dir.join(format!("{}.down.sql", stem));

        let up_template = format!(
            "-- Migration: {}\n-- Version: {}\n-- Created: {}\n\n-- Add your schema changes here\n",
            name, next_version, created
        );
        let down_template = format!(
            "-- Migration: {}\n-- Version: {}\n-- Created: {}\n\n-- Reverse the changes of {}.up.sql here\n",
            name, next_version, created, stem
        );

        fs::write(&up_path, up_template).map_err(|e| MigrateError::io(&up_path, e))?;
        fs::write(&down_path, down_template).map_err(|e| MigrateError::io(&down_path, e))?;

        tracing::info!(version = next_version, name = %slug, "created migration");
        Ok((up_path, down_path))
    }
}

fn parse_filename(file_name: &str) -> MigrateResult<(i64, String, MigrationDirection)> {
    let caps = FILENAME_RE.captures(file_name).ok_or_else(|| {
        MigrateError::InvalidMigrationSet(format!(
            "malformed migration filename '{}': expected <version>_<name>.up.sql or <version>_<name>.down.sql",
            file_name
        ))
    })?;

    let version: i64 = caps[1].parse().map_err(|_| {
        MigrateError::InvalidMigrationSet(format!("version prefix of '{}' is too large", file_name))
    })?;
    if version == 0 {
        return Err(MigrateError::InvalidMigrationSet(format!(
            "'{}': version 0 is reserved for an empty history",
            file_name
        )));
    }

    let direction = if &caps[3] == "up" {
        MigrationDirection::Up
    } else {
        MigrationDirection::Down
    };

    Ok((version, caps[2].to_string(), direction))
}

fn check_contiguous(migrations: &[Migration]) -> MigrateResult<()> {
    for pair in migrations.windows(2) {
        if pair[1].version != pair[0].version + 1 {
            return Err(MigrateError::InvalidMigrationSet(format!(
                "gap in migration versions: {} is followed by {}",
                pair[0].label(),
                pair[1].label()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_load_orders_by_version() {
        let dir = TempDir::new().unwrap();
        write(&dir, "0002_add_posts.up.sql", "CREATE TABLE posts (id SERIAL PRIMARY KEY);");
        write(&dir, "0002_add_posts.down.sql", "DROP TABLE posts;");
        write(&dir, "0001_init.up.sql", "CREATE TABLE users (id SERIAL PRIMARY KEY);");
        write(&dir, "0001_init.down.sql", "DROP TABLE users;");
        write(&dir, "README.md", "not a migration");

        let set = MigrationManager::new(dir.path()).load().unwrap();
        let versions: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(set.get(2).unwrap().name, "add_posts");
        assert!(set.get(1).unwrap().down_sql.as_deref().unwrap().contains("DROP TABLE users"));
        assert_eq!(set.latest_version(), 2);
        assert_eq!(set.pending_after(1).count(), 1);
    }

    #[test]
    fn test_gap_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_init.up.sql", "SELECT 1;");
        write(&dir, "3_later.up.sql", "SELECT 1;");

        let err = MigrationManager::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigrationSet(ref msg) if msg.contains("gap")));
    }

    #[test]
    fn test_malformed_filename_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "init.sql", "SELECT 1;");

        let err = MigrationManager::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigrationSet(_)));
    }

    #[test]
    fn test_orphan_down_and_name_mismatch_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_init.down.sql", "SELECT 1;");
        assert!(MigrationManager::new(dir.path()).load().is_err());

        let dir = TempDir::new().unwrap();
        write(&dir, "1_init.up.sql", "SELECT 1;");
        write(&dir, "1_other.down.sql", "SELECT 1;");
        let err = MigrationManager::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigrationSet(ref msg) if msg.contains("two names")));
    }

    #[test]
    fn test_duplicate_version_with_padding_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_init.up.sql", "SELECT 1;");
        write(&dir, "001_init.up.sql", "SELECT 1;");

        let err = MigrationManager::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidMigrationSet(ref msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = MigrationManager::new(dir.path().join("missing")).load().unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_precheck() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_init.up.sql", "CREATE TABLE t (name TEXT DEFAULT 'x);");
        write(&dir, "2_next.up.sql", "SELECT 1;");

        let manager = MigrationManager::new(dir.path());
        let set = manager.load().unwrap();

        let err = manager.precheck(set.iter(), MigrationDirection::Up).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationApply { version: 1, .. }));

        let err = manager
            .precheck(set.get(2), MigrationDirection::Down)
            .unwrap_err();
        assert!(matches!(err, MigrateError::MigrationRollback { version: 2, .. }));
    }

    #[test]
    fn test_create_migration() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::new(dir.path().join("content"));

        let (up, down) = manager.create_migration("create posts").unwrap();
        assert!(up.ends_with("0001_create_posts.up.sql"));
        assert!(down.ends_with("0001_create_posts.down.sql"));
        assert!(fs::read_to_string(&up).unwrap().contains("-- Migration: create posts"));

        let (up, _) = manager.create_migration("add_index").unwrap();
        assert!(up.ends_with("0002_add_index.up.sql"));
        assert_eq!(manager.load().unwrap().len(), 2);

        assert!(manager.create_migration("bad/name").is_err());
    }
}
