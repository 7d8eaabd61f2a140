//! Migration Rollback - Handles rolling back applied migrations
//!
//! Rolls back by batch, by step count or entirely, executing down scripts in
//! descending version order. Every down script involved is checked before the
//! first one runs, and each step commits on its own.

use sqlx::Executor;
use std::time::Instant;

use super::definitions::{Migration, MigrationDirection, MigrationRecord, RollbackReport};
use super::runner::MigrationRunner;
use crate::error::{MigrateError, MigrateResult};

impl MigrationRunner {
    /// Roll back the most recent batch, i.e. everything the last
    /// `migrate_up` applied
    pub async fn migrate_down(&self) -> MigrateResult<RollbackReport> {
        let records = self.clean_records().await?;
        let last_batch = match records.iter().map(|r| r.batch).max() {
            Some(batch) => batch,
            None => return self.nothing_to_roll_back().await,
        };

        let versions = records
            .iter()
            .filter(|r| r.batch == last_batch)
            .map(|r| r.version)
            .collect();
        self.rollback_versions(versions).await
    }

    /// Roll back the `steps` most recent versions
    pub async fn rollback_steps(&self, steps: usize) -> MigrateResult<RollbackReport> {
        let versions = self
            .clean_records()
            .await?
            .iter()
            .take(steps)
            .map(|r| r.version)
            .collect();
        self.rollback_versions(versions).await
    }

    /// Roll back every applied version
    pub async fn rollback_all(&self) -> MigrateResult<RollbackReport> {
        let versions = self
            .clean_records()
            .await?
            .iter()
            .map(|r| r.version)
            .collect();
        self.rollback_versions(versions).await
    }

    /// Recorded rows, highest first, refusing to continue on a dirty history
    async fn clean_records(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let records = self.records().await?;
        if let Some(dirty) = records.iter().find(|r| r.dirty) {
            return Err(MigrateError::Dirty {
                version: dirty.version,
            });
        }
        Ok(records)
    }

    async fn nothing_to_roll_back(&self) -> MigrateResult<RollbackReport> {
        tracing::info!(domain = self.config().domain(), "nothing to roll back");
        Ok(RollbackReport {
            version: self.current_version().await?.version,
            ..RollbackReport::default()
        })
    }

    /// `versions` must be descending
    async fn rollback_versions(&self, versions: Vec<i64>) -> MigrateResult<RollbackReport> {
        let start_time = Instant::now();
        if versions.is_empty() {
            return self.nothing_to_roll_back().await;
        }

        let set = self.manager().load()?;
        let migrations = versions
            .iter()
            .map(|&version| {
                set.get(version).ok_or_else(|| MigrateError::MigrationRollback {
                    version,
                    reason: format!(
                        "no migration file for applied version in {}",
                        self.manager().migrations_dir().display()
                    ),
                })
            })
            .collect::<MigrateResult<Vec<&Migration>>>()?;

        // Fail fast: a missing or unreadable down script anywhere in the
        // range aborts before the first step runs
        self.manager()
            .precheck(migrations.iter().copied(), MigrationDirection::Down)?;

        let mut report = RollbackReport::default();
        for migration in migrations {
            if self.rollback_step(migration).await? {
                report.rolled_back.push(migration.version);
            }
        }

        report.version = self.current_version().await?.version;
        report.execution_time_ms = start_time.elapsed().as_millis();

        tracing::info!(
            domain = self.config().domain(),
            rolled_back = report.rolled_back.len(),
            version = report.version,
            "rollback finished"
        );
        Ok(report)
    }

    /// Roll back one version; `Ok(false)` when a concurrent runner already did
    async fn rollback_step(&self, migration: &Migration) -> MigrateResult<bool> {
        let domain = self.config().domain();
        let versions = self.versions();

        let down_sql = migration
            .down_sql
            .as_deref()
            .ok_or_else(|| MigrateError::MigrationRollback {
                version: migration.version,
                reason: format!("no down script for {}", migration.label()),
            })?;

        let mut tx = self.pool().begin().await?;
        versions.lock(&mut *tx).await?;

        let state = versions.state(&mut *tx).await?;
        if state.dirty {
            return Err(MigrateError::Dirty {
                version: state.version,
            });
        }
        if state.version < migration.version {
            tracing::debug!(
                domain,
                version = migration.version,
                "migration already rolled back by another runner"
            );
            tx.rollback().await?;
            return Ok(false);
        }
        if state.version != migration.version {
            return Err(MigrateError::MigrationRollback {
                version: migration.version,
                reason: format!("not the most recent version (current is {})", state.version),
            });
        }

        tracing::info!(
            domain,
            version = migration.version,
            name = %migration.name,
            "rolling back migration"
        );

        if let Err(e) = (&mut *tx).execute(down_sql).await {
            let reason = e.to_string();
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(domain, error = %rollback_err, "rollback of failed down script failed");
            }
            self.record_dirty_rollback(migration.version).await;

            tracing::error!(domain, version = migration.version, error = %reason, "rollback failed");
            return Err(MigrateError::MigrationRollback {
                version: migration.version,
                reason,
            });
        }

        versions.remove(&mut *tx, migration.version).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// The version row stays; only its dirty flag is raised
    async fn record_dirty_rollback(&self, version: i64) {
        let result = async {
            let mut tx = self.pool().begin().await?;
            self.versions().lock(&mut *tx).await?;
            self.versions().mark_dirty(&mut *tx, version).await?;
            tx.commit().await?;
            Ok::<(), MigrateError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                domain = self.config().domain(),
                version,
                error = %e,
                "could not mark migration dirty"
            );
        }
    }
}
