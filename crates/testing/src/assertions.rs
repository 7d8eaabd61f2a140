//! Schema assertions against one PostgreSQL schema.

use sqlx::PgPool;

use crate::{TestError, TestResult};

/// Table and column checks scoped to `schema`
pub struct SchemaAssertions<'a> {
    pool: &'a PgPool,
    schema: &'a str,
}

impl<'a> SchemaAssertions<'a> {
    pub fn new(pool: &'a PgPool, schema: &'a str) -> Self {
        Self { pool, schema }
    }

    /// Base tables in the schema, sorted
    pub async fn tables(&self) -> TestResult<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(self.schema)
        .fetch_all(self.pool)
        .await?;
        Ok(tables)
    }

    /// Column names of `table` in ordinal order; empty if it does not exist
    pub async fn columns(&self, table: &str) -> TestResult<Vec<String>> {
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(self.schema)
        .bind(table)
        .fetch_all(self.pool)
        .await?;
        Ok(columns)
    }

    pub async fn table_exists(&self, table: &str) -> TestResult<bool> {
        Ok(self.tables().await?.iter().any(|t| t == table))
    }

    pub async fn assert_table_exists(&self, table: &str) -> TestResult<()> {
        if !self.table_exists(table).await? {
            return Err(TestError::Assertion {
                message: format!("table {} does not exist in schema {}", table, self.schema),
            });
        }
        Ok(())
    }

    pub async fn assert_table_missing(&self, table: &str) -> TestResult<()> {
        if self.table_exists(table).await? {
            return Err(TestError::Assertion {
                message: format!("table {} unexpectedly exists in schema {}", table, self.schema),
            });
        }
        Ok(())
    }

    /// `table` has exactly `expected` columns, in order
    pub async fn assert_columns(&self, table: &str, expected: &[&str]) -> TestResult<()> {
        let actual = self.columns(table).await?;
        if actual != expected {
            return Err(TestError::Assertion {
                message: format!(
                    "columns of {}.{}: expected {:?}, found {:?}",
                    self.schema, table, expected, actual
                ),
            });
        }
        Ok(())
    }
}
