//! Read the live shape of one PostgreSQL schema.
//!
//! All queries run in a single `REPEATABLE READ READ ONLY` transaction so the
//! tables, columns and indexes come from one snapshot even while migrations
//! run concurrently.

use sqlx::PgPool;

use super::model::ActualSchema;
use crate::error::MigrateResult;

const TABLES_SQL: &str = "\
    SELECT table_name::text \
    FROM information_schema.tables \
    WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
    ORDER BY table_name";

const COLUMNS_SQL: &str = "\
    SELECT c.table_name::text, c.column_name::text \
    FROM information_schema.columns c \
    JOIN information_schema.tables t \
      ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
    WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE' \
    ORDER BY c.table_name, c.ordinal_position";

// Indexes created for PRIMARY KEY, UNIQUE and EXCLUDE constraints are part of
// the table definition, not declared with CREATE INDEX
const INDEXES_SQL: &str = "\
    SELECT i.indexname::text, i.tablename::text \
    FROM pg_indexes i \
    WHERE i.schemaname = $1 \
      AND NOT EXISTS ( \
        SELECT 1 FROM pg_constraint con \
        JOIN pg_class ic ON ic.oid = con.conindid \
        JOIN pg_namespace n ON n.oid = ic.relnamespace \
        WHERE con.contype IN ('p', 'u', 'x') \
          AND n.nspname = i.schemaname \
          AND ic.relname = i.indexname) \
    ORDER BY i.indexname";

/// Introspect `namespace`, leaving out tables whose name starts with one of
/// `ignored_prefixes` and the indexes on them
pub async fn introspect(
    pool: &PgPool,
    namespace: &str,
    ignored_prefixes: &[String],
) -> MigrateResult<ActualSchema> {
    let ignored = |table: &str| ignored_prefixes.iter().any(|p| table.starts_with(p.as_str()));

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let tables: Vec<String> = sqlx::query_scalar(TABLES_SQL)
        .bind(namespace)
        .fetch_all(&mut *tx)
        .await?;
    let columns: Vec<(String, String)> = sqlx::query_as(COLUMNS_SQL)
        .bind(namespace)
        .fetch_all(&mut *tx)
        .await?;
    let indexes: Vec<(String, String)> = sqlx::query_as(INDEXES_SQL)
        .bind(namespace)
        .fetch_all(&mut *tx)
        .await?;
    tx.commit().await?;

    let mut schema = ActualSchema::default();
    for table in tables.into_iter().filter(|t| !ignored(t)) {
        schema.tables.insert(table, Vec::new());
    }
    for (table, column) in columns {
        if let Some(cols) = schema.tables.get_mut(&table) {
            cols.push(column);
        }
    }
    for (index, table) in indexes {
        if !ignored(&table) {
            schema.indexes.insert(index, table);
        }
    }

    tracing::debug!(
        namespace,
        tables = schema.table_count(),
        indexes = schema.index_count(),
        "introspected schema"
    );
    Ok(schema)
}
