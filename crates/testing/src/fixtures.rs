//! Migration and schema files in a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::TestResult;

/// Temporary directory holding one domain's migrations and schema files.
///
/// Migrations go to `<root>/migrations/<domain>`, schema files to
/// `<root>/schema`. Everything is removed when the fixture drops.
pub struct MigrationFixture {
    root: TempDir,
    domain: String,
}

impl MigrationFixture {
    pub fn new(domain: impl Into<String>) -> TestResult<Self> {
        let fixture = Self {
            root: TempDir::new()?,
            domain: domain.into(),
        };
        fs::create_dir_all(fixture.migrations_path())?;
        fs::create_dir_all(fixture.schema_path())?;
        Ok(fixture)
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn migrations_path(&self) -> PathBuf {
        self.root.path().join("migrations").join(&self.domain)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.root.path().join("schema")
    }

    /// Write `<version>_<name>.up.sql` and, if given, the down script
    pub fn migration(&self, version: i64, name: &str, up: &str, down: Option<&str>) -> TestResult<&Self> {
        let dir = self.migrations_path();
        fs::write(dir.join(format!("{:04}_{}.up.sql", version, name)), up)?;
        if let Some(down) = down {
            fs::write(dir.join(format!("{:04}_{}.down.sql", version, name)), down)?;
        }
        Ok(self)
    }

    /// Remove a migration script, e.g. to simulate a missing down file
    pub fn remove_script(&self, version: i64, name: &str, direction: &str) -> TestResult<()> {
        let path = self
            .migrations_path()
            .join(format!("{:04}_{}.{}.sql", version, name, direction));
        fs::remove_file(path)?;
        Ok(())
    }

    /// Write an expected-schema file relative to the schema directory,
    /// e.g. `content.sql` or `content/01_posts.sql`
    pub fn schema_file(&self, relative: &str, sql: &str) -> TestResult<&Self> {
        let path = self.schema_path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, sql)?;
        Ok(self)
    }
}
