//! Database testing utilities
//!
//! A [`TestDatabase`] owns a uniquely named PostgreSQL schema. Every pooled
//! connection has its `search_path` set to that schema, so code under test
//! creates and finds its tables there without knowing about the isolation.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use crate::assertions::SchemaAssertions;
use crate::readiness::{check_readiness, Readiness, ReadinessContext};
use crate::{utils, TestError, TestResult};

/// Isolated schema on the test database
#[derive(Clone)]
pub struct TestDatabase {
    pool: PgPool,
    schema: String,
    database_url: String,
}

impl TestDatabase {
    /// Create a fresh schema on the database described by `ctx`
    pub async fn new(ctx: &ReadinessContext) -> TestResult<Self> {
        let database_url = ctx.database_url.clone().ok_or_else(|| {
            TestError::Setup("no database URL configured (set TEST_DATABASE_URL)".to_string())
        })?;
        let schema = utils::unique_identifier("strata_test");

        let admin = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ctx.timeout)
            .connect(&database_url)
            .await?;
        admin
            .execute(format!("CREATE SCHEMA {}", schema).as_str())
            .await?;
        admin.close().await;

        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ctx.timeout)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&database_url)
            .await?;

        tracing::debug!(schema = %schema, "created test schema");
        Ok(Self {
            pool,
            schema,
            database_url,
        })
    }

    /// `None` (with the reason printed) when no database is available, so
    /// callers can skip
    pub async fn try_new() -> Option<Self> {
        let ctx = ReadinessContext::from_env();
        if let Readiness::NotReady { reason } = check_readiness(&ctx).await {
            eprintln!("skipping database test: {}", reason);
            return None;
        }

        match Self::new(&ctx).await {
            Ok(db) => Some(db),
            Err(e) => {
                eprintln!("skipping database test: {}", e);
                None
            }
        }
    }

    /// Pool whose connections resolve unqualified names in [`Self::schema`]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Execute raw SQL (possibly several statements) for test setup
    pub async fn execute(&self, sql: &str) -> TestResult<()> {
        self.pool.execute(sql).await?;
        Ok(())
    }

    pub fn assertions(&self) -> SchemaAssertions<'_> {
        SchemaAssertions::new(&self.pool, &self.schema)
    }

    /// Drop the schema with everything in it and close the pool
    pub async fn cleanup(self) -> TestResult<()> {
        self.pool
            .execute(format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema).as_str())
            .await?;
        self.pool.close().await;
        tracing::debug!(schema = %self.schema, "dropped test schema");
        Ok(())
    }
}
