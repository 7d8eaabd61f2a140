//! Migration Runner - Executes migrations against the database
//!
//! Each migration is applied in its own transaction which first takes the
//! domain's advisory lock, re-reads the version table, runs the script and
//! records the new version. Concurrent runners therefore serialize per step
//! and never apply a version twice.

use sqlx::{Executor, PgPool};
use std::collections::HashMap;
use std::time::Instant;
use strata_core::MigrationConfig;

use super::definitions::{
    Migration, MigrateReport, MigrationDirection, MigrationRecord, MigrationStatus, VersionState,
};
use super::manager::MigrationManager;
use super::tracking::VersionTable;
use crate::database::{self, PoolConfig};
use crate::error::{MigrateError, MigrateResult};

/// Migration runner that executes one domain's migrations against a database
pub struct MigrationRunner {
    config: MigrationConfig,
    manager: MigrationManager,
    versions: VersionTable,
    pool: PgPool,
}

impl MigrationRunner {
    /// Create a runner on an existing pool
    pub fn new(config: MigrationConfig, pool: PgPool) -> Self {
        let manager = MigrationManager::new(config.migrations_path());
        let versions = VersionTable::new(config.migrations_table());
        Self {
            config,
            manager,
            versions,
            pool,
        }
    }

    /// Create a runner with its own pool built from the config's URL
    pub async fn connect(config: MigrationConfig) -> MigrateResult<Self> {
        let pool = database::connect(config.database_url(), &PoolConfig::default()).await?;
        Ok(Self::new(config, pool))
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub(crate) fn versions(&self) -> &VersionTable {
        &self.versions
    }

    /// Current version and dirty flag; `VersionState::EMPTY` before the
    /// version table exists
    pub async fn current_version(&self) -> MigrateResult<VersionState> {
        let mut conn = self.pool.acquire().await?;
        if !self.versions.exists(&mut conn).await? {
            return Ok(VersionState::EMPTY);
        }
        self.versions.state(&mut conn).await
    }

    /// Apply every pending migration, ascending.
    ///
    /// The whole set is validated and every pending script tokenized before
    /// the first statement runs. Calling this again with no new files applies
    /// nothing.
    pub async fn migrate_up(&self) -> MigrateResult<MigrateReport> {
        let start_time = Instant::now();
        let domain = self.config.domain();

        let set = self.manager.load()?;
        self.ensure_version_table().await?;

        let state = self.current_version().await?;
        if state.dirty {
            return Err(MigrateError::Dirty {
                version: state.version,
            });
        }
        if state.version > set.latest_version() {
            return Err(MigrateError::InvalidMigrationSet(format!(
                "database is at version {} but {} only contains versions up to {}",
                state.version,
                self.manager.migrations_dir().display(),
                set.latest_version()
            )));
        }

        let pending: Vec<&Migration> = set.pending_after(state.version).collect();
        self.manager
            .precheck(pending.iter().copied(), MigrationDirection::Up)?;

        if pending.is_empty() {
            tracing::info!(domain, version = state.version, "schema is up to date");
            return Ok(MigrateReport {
                version: state.version,
                execution_time_ms: start_time.elapsed().as_millis(),
                ..MigrateReport::default()
            });
        }

        let mut report = MigrateReport::default();
        for migration in pending {
            if self.apply_step(migration, &mut report.batch).await? {
                report.applied.push(migration.version);
            } else {
                report.skipped.push(migration.version);
            }
        }

        report.version = self.current_version().await?.version;
        report.execution_time_ms = start_time.elapsed().as_millis();

        tracing::info!(
            domain,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            version = report.version,
            elapsed_ms = report.execution_time_ms as u64,
            "migrations applied"
        );
        Ok(report)
    }

    /// Apply one migration; `Ok(false)` when a concurrent runner already did
    async fn apply_step(&self, migration: &Migration, batch: &mut Option<i32>) -> MigrateResult<bool> {
        let domain = self.config.domain();
        let mut tx = self.pool.begin().await?;
        self.versions.lock(&mut *tx).await?;

        let state = self.versions.state(&mut *tx).await?;
        if state.dirty {
            return Err(MigrateError::Dirty {
                version: state.version,
            });
        }
        if state.version >= migration.version {
            tracing::debug!(
                domain,
                version = migration.version,
                "migration already applied by another runner"
            );
            tx.rollback().await?;
            return Ok(false);
        }

        let batch_no = match *batch {
            Some(batch_no) => batch_no,
            None => {
                let batch_no = self.versions.next_batch(&mut *tx).await?;
                *batch = Some(batch_no);
                batch_no
            }
        };

        tracing::info!(
            domain,
            version = migration.version,
            name = %migration.name,
            batch = batch_no,
            "applying migration"
        );

        if let Err(e) = (&mut *tx).execute(migration.up_sql.as_str()).await {
            let reason = e.to_string();
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(domain, error = %rollback_err, "rollback after failed migration failed");
            }
            self.record_dirty_apply(migration, batch_no).await;

            tracing::error!(domain, version = migration.version, error = %reason, "migration failed");
            return Err(MigrateError::MigrationApply {
                version: migration.version,
                name: migration.name.clone(),
                reason,
            });
        }

        self.versions
            .insert(&mut *tx, migration.version, &migration.name, batch_no, false)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Record the failed version as dirty so later runs stop until an
    /// operator forces a clean version
    async fn record_dirty_apply(&self, migration: &Migration, batch_no: i32) {
        let result = async {
            let mut tx = self.pool.begin().await?;
            self.versions.lock(&mut *tx).await?;
            self.versions
                .insert(&mut *tx, migration.version, &migration.name, batch_no, true)
                .await?;
            tx.commit().await?;
            Ok::<(), MigrateError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                domain = self.config.domain(),
                version = migration.version,
                error = %e,
                "could not mark migration dirty"
            );
        }
    }

    /// Every migration in the directory with its recorded status
    pub async fn status(&self) -> MigrateResult<Vec<(Migration, MigrationStatus)>> {
        let set = self.manager.load()?;
        let records: HashMap<i64, MigrationRecord> = self
            .records()
            .await?
            .into_iter()
            .map(|r| (r.version, r))
            .collect();

        Ok(set
            .iter()
            .map(|migration| {
                let status = match records.get(&migration.version) {
                    Some(record) if record.dirty => MigrationStatus::Dirty,
                    Some(record) => MigrationStatus::Applied {
                        applied_at: record.applied_at,
                        batch: record.batch,
                    },
                    None => MigrationStatus::Pending,
                };
                (migration.clone(), status)
            })
            .collect())
    }

    /// Recorded rows, highest version first; empty before the table exists
    pub async fn records(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let mut conn = self.pool.acquire().await?;
        if !self.versions.exists(&mut conn).await? {
            return Ok(Vec::new());
        }
        self.versions.records(&mut conn).await
    }

    /// Clear the dirty flag and make `version` the clean current version.
    ///
    /// Runs no migration SQL; the operator is responsible for the schema
    /// matching `version`. `0` empties the history.
    pub async fn force(&self, version: i64) -> MigrateResult<()> {
        if version < 0 {
            return Err(MigrateError::InvalidMigrationSet(format!(
                "cannot force negative version {}",
                version
            )));
        }

        let set = self.manager.load()?;
        let name = match set.get(version) {
            Some(migration) => migration.name.clone(),
            None if version == 0 => String::new(),
            None => {
                return Err(MigrateError::InvalidMigrationSet(format!(
                    "no migration with version {} in {}",
                    version,
                    self.manager.migrations_dir().display()
                )))
            }
        };

        self.ensure_version_table().await?;

        let mut tx = self.pool.begin().await?;
        self.versions.lock(&mut *tx).await?;
        self.versions.force(&mut *tx, version, &name).await?;
        tx.commit().await?;

        tracing::warn!(domain = self.config.domain(), version, "forced migration version");
        Ok(())
    }

    /// Create the version table under the advisory lock, so concurrent first
    /// runs do not race on `CREATE TABLE IF NOT EXISTS`
    async fn ensure_version_table(&self) -> MigrateResult<()> {
        let mut tx = self.pool.begin().await?;
        self.versions.lock(&mut *tx).await?;
        if !self.versions.exists(&mut *tx).await? {
            tracing::debug!(table = %self.versions.name(), "creating version table");
            self.versions.create(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
