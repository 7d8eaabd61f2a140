use crate::config::{ConfigError, ConfigValidator, Environment, IdentifierValidator, MigrationConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Where a domain's tables live in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Each domain owns a PostgreSQL schema with the domain's name
    PerDomain,
    /// All domains share one PostgreSQL schema
    Shared(String),
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::Shared("public".to_string())
    }
}

impl Namespace {
    /// PostgreSQL schema holding the tables of `domain`
    pub fn schema_for<'a>(&'a self, domain: &'a str) -> &'a str {
        match self {
            Namespace::PerDomain => domain,
            Namespace::Shared(schema) => schema,
        }
    }
}

/// Project file (`strata.yaml`) describing every domain in a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Environment variable holding the connection string
    pub database_url_env: String,
    /// Root directory with one migration sub-directory per domain
    pub migrations_dir: PathBuf,
    /// Directory with expected-schema files
    pub schema_dir: PathBuf,
    /// `per_domain` or `{shared: <schema>}`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub namespace: Namespace,
    /// Explicit domain list; discovered from `schema_dir` when empty
    pub domains: Vec<String>,
    pub environment: Environment,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            database_url_env: "DATABASE_URL".to_string(),
            migrations_dir: PathBuf::from("migrations"),
            schema_dir: PathBuf::from("schema"),
            namespace: Namespace::default(),
            domains: Vec::new(),
            environment: Environment::default(),
        }
    }
}

impl StrataConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("strata.yaml")
    }

    /// Load the project file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: StrataConfig = serde_yaml::from_str(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load the project file if it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!(path = %path.display(), "no project file, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(env_str) = env::var("STRATA_ENV") {
            self.environment = env_str.parse()?;
        }
        if let Ok(dir) = env::var("STRATA_MIGRATIONS_DIR") {
            self.migrations_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("STRATA_SCHEMA_DIR") {
            self.schema_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Resolve the connection string from the configured environment variable
    pub fn database_url(&self) -> Result<String, ConfigError> {
        env::var(&self.database_url_env).map_err(|_| {
            ConfigError::environment_error(format!(
                "{} is not set; it must hold the database connection string",
                self.database_url_env
            ))
        })
    }

    /// Migration directory of `domain`; the name must be an identifier
    pub fn migrations_path(&self, domain: &str) -> Result<PathBuf, ConfigError> {
        IdentifierValidator { field: "domain" }.validate(domain)?;
        Ok(self.migrations_dir.join(domain))
    }

    /// Derive the migration configuration for one domain
    pub fn migration_config(&self, domain: &str) -> Result<MigrationConfig, ConfigError> {
        MigrationConfig::builder(domain)
            .database_url(self.database_url()?)
            .migrations_path(self.migrations_path(domain)?)
            .environment(self.environment)
            .build()
    }
}
