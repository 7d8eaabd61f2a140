use crate::config::{
    ConfigError, ConfigValidator, DatabaseUrlValidator, Environment, IdentifierValidator,
};
use std::env;
use std::path::{Path, PathBuf};

/// Immutable description of one domain's migration run.
///
/// Built through [`MigrationConfig::builder`] or [`MigrationConfig::from_env`];
/// both validate the domain name and database URL, so a constructed value is
/// always usable by a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    domain: String,
    database_url: String,
    migrations_path: PathBuf,
    environment: Environment,
    migrations_table: String,
}

impl MigrationConfig {
    /// Start building a configuration for `domain`
    pub fn builder(domain: impl Into<String>) -> MigrationConfigBuilder {
        MigrationConfigBuilder::new(domain)
    }

    /// Load configuration for `domain` from environment variables
    ///
    /// - `DATABASE_URL` (required)
    /// - `MIGRATIONS_PATH` (defaults to `migrations/<domain>`)
    /// - `STRATA_ENV` (defaults to development)
    pub fn from_env(domain: &str) -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| {
            ConfigError::missing_required("database_url", "DATABASE_URL environment variable is not set")
        })?;

        let mut builder = Self::builder(domain).database_url(database_url);

        if let Ok(path) = env::var("MIGRATIONS_PATH") {
            builder = builder.migrations_path(path);
        }

        if let Ok(env_str) = env::var("STRATA_ENV") {
            builder = builder.environment(env_str.parse()?);
        }

        builder.build()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn migrations_path(&self) -> &Path {
        &self.migrations_path
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Name of the table recording applied versions for this domain
    pub fn migrations_table(&self) -> &str {
        &self.migrations_table
    }
}

/// Builder for [`MigrationConfig`]
#[derive(Debug, Clone)]
pub struct MigrationConfigBuilder {
    domain: String,
    database_url: Option<String>,
    migrations_path: Option<PathBuf>,
    environment: Environment,
    migrations_table: Option<String>,
}

impl MigrationConfigBuilder {
    fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            database_url: None,
            migrations_path: None,
            environment: Environment::default(),
            migrations_table: None,
        }
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn migrations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migrations_path = Some(path.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Override the version table name (default `schema_migrations_<domain>`)
    pub fn migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = Some(table.into());
        self
    }

    pub fn build(self) -> Result<MigrationConfig, ConfigError> {
        IdentifierValidator { field: "domain" }.validate(self.domain.as_str())?;

        let database_url = self.database_url.ok_or_else(|| {
            ConfigError::missing_required("database_url", "call .database_url() or set DATABASE_URL")
        })?;
        DatabaseUrlValidator::default().validate(database_url.as_str())?;

        let migrations_table = self
            .migrations_table
            .unwrap_or_else(|| format!("schema_migrations_{}", self.domain.to_lowercase()));
        IdentifierValidator {
            field: "migrations_table",
        }
        .validate(migrations_table.as_str())?;

        let migrations_path = self
            .migrations_path
            .unwrap_or_else(|| PathBuf::from("migrations").join(&self.domain));

        Ok(MigrationConfig {
            domain: self.domain,
            database_url,
            migrations_path,
            environment: self.environment,
            migrations_table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_builder_defaults() {
        let config = MigrationConfig::builder("content")
            .database_url("postgres://localhost/app")
            .build()
            .unwrap();

        assert_eq!(config.domain(), "content");
        assert_eq!(config.migrations_path(), Path::new("migrations/content"));
        assert_eq!(config.migrations_table(), "schema_migrations_content");
        assert_eq!(config.environment(), Environment::Development);
    }

    #[test]
    fn test_builder_rejects_empty_domain() {
        let err = MigrationConfig::builder("")
            .database_url("postgres://localhost/app")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "domain"));
    }

    #[test]
    fn test_builder_requires_database_url() {
        let err = MigrationConfig::builder("content").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn test_builder_overrides() {
        let config = MigrationConfig::builder("inquiries")
            .database_url("postgresql://db:5432/app")
            .migrations_path("/srv/migrations/inquiries")
            .environment(Environment::Testing)
            .migrations_table("inquiry_versions")
            .build()
            .unwrap();

        assert_eq!(config.migrations_path(), Path::new("/srv/migrations/inquiries"));
        assert_eq!(config.migrations_table(), "inquiry_versions");
        assert_eq!(config.environment(), Environment::Testing);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("DATABASE_URL", "postgres://localhost/strata_test");
        env::set_var("MIGRATIONS_PATH", "db/content");
        env::set_var("STRATA_ENV", "test");

        let config = MigrationConfig::from_env("content").unwrap();
        assert_eq!(config.database_url(), "postgres://localhost/strata_test");
        assert_eq!(config.migrations_path(), Path::new("db/content"));
        assert_eq!(config.environment(), Environment::Testing);

        env::remove_var("DATABASE_URL");
        env::remove_var("MIGRATIONS_PATH");
        env::remove_var("STRATA_ENV");

        assert!(MigrationConfig::from_env("content").is_err());
    }
}
