//! # strata-core
//!
//! Configuration, environment handling and logging shared by the strata
//! migration runner, schema validator and CLI.

pub mod config;
pub mod logging;

pub use config::{
    ConfigError, Environment, MigrationConfig, MigrationConfigBuilder, Namespace, StrataConfig,
};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
