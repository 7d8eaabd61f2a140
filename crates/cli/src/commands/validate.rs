use anyhow::Result;
use strata_core::StrataConfig;
use strata_migrate::{generate_report, PoolConfig, SchemaValidator};

/// Validate `domains` (or all configured/discovered ones) and print the
/// report. Returns whether every domain is valid.
pub async fn run(config: &StrataConfig, domains: &[String], json: bool) -> Result<bool> {
    let pool = strata_migrate::connect(&config.database_url()?, &PoolConfig::default()).await?;
    let validator = SchemaValidator::new(pool, &config.schema_dir).with_namespace(config.namespace.clone());

    let domains = if !domains.is_empty() {
        domains.to_vec()
    } else if !config.domains.is_empty() {
        config.domains.clone()
    } else {
        validator.domains()?
    };

    let results = validator.validate_domains(&domains).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", generate_report(&results));
    }

    Ok(results.iter().all(|r| r.is_valid()))
}
