//! Version table access and the advisory lock serializing version bumps.
//!
//! Every function takes a connection so callers decide the transaction: the
//! runner always calls these inside the transaction of one apply/rollback
//! step, after [`VersionTable::lock`].

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::definitions::{MigrationRecord, VersionState};
use crate::error::MigrateResult;

/// Handle on one domain's version table
#[derive(Debug, Clone)]
pub struct VersionTable {
    table: String,
    lock_key: i64,
}

impl VersionTable {
    /// `table` must already be a validated identifier
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let lock_key = advisory_lock_key(&table);
        Self { table, lock_key }
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }

    /// Take the transaction-scoped advisory lock; released on commit/rollback
    pub async fn lock(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        tracing::trace!(table = %self.table, key = self.lock_key, "acquiring advisory lock");
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.lock_key)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn exists(&self, conn: &mut PgConnection) -> MigrateResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(self.table.as_str())
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    pub async fn create(&self, conn: &mut PgConnection) -> MigrateResult<()> {
        sqlx::query(&self.create_sql()).execute(&mut *conn).await?;
        Ok(())
    }

    /// Highest version and whether any row is dirty
    pub async fn state(&self, conn: &mut PgConnection) -> MigrateResult<VersionState> {
        let sql = format!(
            "SELECT COALESCE(MAX(version), 0), COALESCE(BOOL_OR(dirty), FALSE) FROM {}",
            self.table
        );
        let (version, dirty): (i64, bool) = sqlx::query_as(&sql).fetch_one(&mut *conn).await?;
        Ok(VersionState { version, dirty })
    }

    /// All rows, highest version first
    pub async fn records(&self, conn: &mut PgConnection) -> MigrateResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT version, name, batch, dirty, applied_at FROM {} ORDER BY version DESC",
            self.table
        );
        let rows: Vec<(i64, String, i32, bool, DateTime<Utc>)> =
            sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

        Ok(rows
            .into_iter()
            .map(|(version, name, batch, dirty, applied_at)| MigrationRecord {
                version,
                name,
                batch,
                dirty,
                applied_at,
            })
            .collect())
    }

    pub async fn next_batch(&self, conn: &mut PgConnection) -> MigrateResult<i32> {
        let sql = format!("SELECT COALESCE(MAX(batch), 0) + 1 FROM {}", self.table);
        let batch: i32 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(batch)
    }

    /// Record `version`; an existing row wins, so a dirty insert never
    /// overwrites a version another runner applied cleanly
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        version: i64,
        name: &str,
        batch: i32,
        dirty: bool,
    ) -> MigrateResult<()> {
        sqlx::query(&self.insert_sql())
            .bind(version)
            .bind(name)
            .bind(batch)
            .bind(dirty)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn mark_dirty(&self, conn: &mut PgConnection, version: i64) -> MigrateResult<()> {
        let sql = format!("UPDATE {} SET dirty = TRUE WHERE version = $1", self.table);
        sqlx::query(&sql).bind(version).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn remove(&self, conn: &mut PgConnection, version: i64) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE version = $1", self.table);
        sqlx::query(&sql).bind(version).execute(&mut *conn).await?;
        Ok(())
    }

    /// Make `version` the clean current version: drop dirty rows and rows
    /// above it, then record `version` if it is not already there
    pub async fn force(&self, conn: &mut PgConnection, version: i64, name: &str) -> MigrateResult<()> {
        let sql = format!("DELETE FROM {} WHERE version > $1 OR dirty", self.table);
        sqlx::query(&sql).bind(version).execute(&mut *conn).await?;

        if version > 0 {
            let batch = self.next_batch(conn).await?;
            let sql = format!(
                "INSERT INTO {} (version, name, batch, dirty) VALUES ($1, $2, $3, FALSE) \
                 ON CONFLICT (version) DO NOTHING",
                self.table
            );
            sqlx::query(&sql)
                .bind(version)
                .bind(name)
                .bind(batch)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, name, batch, dirty) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (version) DO NOTHING",
            self.table
        )
    }

    /// SQL to create the version tracking table
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version BIGINT PRIMARY KEY,\n    \
                name TEXT NOT NULL,\n    \
                batch INTEGER NOT NULL,\n    \
                dirty BOOLEAN NOT NULL DEFAULT FALSE,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n\
            )",
            self.table
        )
    }
}

/// Stable 64-bit FNV-1a hash of the table name, so every runner working on
/// the same table contends for the same lock
fn advisory_lock_key(table: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = format!("strata:migrations:{}", table)
        .bytes()
        .fold(OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(PRIME));
    hash as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable_per_table() {
        let a = VersionTable::new("schema_migrations_content");
        let b = VersionTable::new("schema_migrations_content");
        let c = VersionTable::new("schema_migrations_inquiries");

        assert_eq!(a.lock_key(), b.lock_key());
        assert_ne!(a.lock_key(), c.lock_key());
    }

    #[test]
    fn test_create_sql() {
        let sql = VersionTable::new("schema_migrations_content").create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS schema_migrations_content"));
        assert!(sql.contains("version BIGINT PRIMARY KEY"));
        assert!(sql.contains("dirty BOOLEAN NOT NULL DEFAULT FALSE"));
    }

    #[test]
    fn test_insert_keeps_existing_row() {
        let sql = VersionTable::new("schema_migrations_content").insert_sql();
        assert!(sql.starts_with("INSERT INTO schema_migrations_content"));
        assert!(sql.ends_with("ON CONFLICT (version) DO NOTHING"));
        assert!(!sql.contains("DO UPDATE"));
    }
}
