use anyhow::Result;
use strata_core::StrataConfig;
use strata_migrate::{MigrationManager, MigrationRunner, MigrationStatus};

/// What `migrate down` rolls back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownTarget {
    LastBatch,
    Steps(usize),
    All,
}

async fn runner(config: &StrataConfig, domain: &str) -> Result<MigrationRunner> {
    let migration_config = config.migration_config(domain)?;
    Ok(MigrationRunner::connect(migration_config).await?)
}

pub async fn up(config: &StrataConfig, domain: &str) -> Result<()> {
    let report = runner(config, domain).await?.migrate_up().await?;

    if report.applied.is_empty() {
        println!("{}: nothing to migrate (version {})", domain, report.version);
    } else {
        println!(
            "{}: applied {} migration(s) in {}ms, now at version {}",
            domain,
            report.applied_count(),
            report.execution_time_ms,
            report.version
        );
    }
    Ok(())
}

pub async fn down(config: &StrataConfig, domain: &str, target: DownTarget) -> Result<()> {
    let runner = runner(config, domain).await?;
    let report = match target {
        DownTarget::LastBatch => runner.migrate_down().await?,
        DownTarget::Steps(steps) => runner.rollback_steps(steps).await?,
        DownTarget::All => runner.rollback_all().await?,
    };

    if report.rolled_back.is_empty() {
        println!("{}: nothing to roll back (version {})", domain, report.version);
    } else {
        println!(
            "{}: rolled back {} migration(s) in {}ms, now at version {}",
            domain,
            report.rolled_back_count(),
            report.execution_time_ms,
            report.version
        );
    }
    Ok(())
}

pub async fn status(config: &StrataConfig, domain: &str) -> Result<()> {
    let runner = runner(config, domain).await?;
    let statuses = runner.status().await?;
    let state = runner.current_version().await?;

    println!("Migration Status: {}", domain);
    println!("================");

    if statuses.is_empty() {
        println!("No migrations found in {}", runner.manager().migrations_dir().display());
    }
    for (migration, status) in &statuses {
        match status {
            MigrationStatus::Applied { applied_at, batch } => println!(
                "  applied  {}  (batch {}, {})",
                migration.label(),
                batch,
                applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            MigrationStatus::Pending => println!("  pending  {}", migration.label()),
            MigrationStatus::Dirty => println!("  DIRTY    {}", migration.label()),
        }
    }

    println!();
    if state.dirty {
        println!(
            "Current version: {} (dirty; fix the schema, then run `strata migrate force {} <version>`)",
            state.version, domain
        );
    } else {
        println!("Current version: {}", state.version);
    }
    Ok(())
}

pub async fn force(config: &StrataConfig, domain: &str, version: i64) -> Result<()> {
    runner(config, domain).await?.force(version).await?;
    println!("{}: forced version {}", domain, version);
    Ok(())
}

pub fn create(config: &StrataConfig, domain: &str, name: &str) -> Result<()> {
    let manager = MigrationManager::new(config.migrations_path(domain)?);
    let (up, down) = manager.create_migration(name)?;

    println!("Created migration:");
    println!("  {}", up.display());
    println!("  {}", down.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_uses_domain_directory() {
        let dir = TempDir::new().unwrap();
        let config = StrataConfig {
            migrations_dir: dir.path().to_path_buf(),
            ..StrataConfig::default()
        };

        create(&config, "content", "create_posts").unwrap();
        assert!(dir.path().join("content/0001_create_posts.up.sql").is_file());
        assert!(dir.path().join("content/0001_create_posts.down.sql").is_file());

        assert!(create(&config, "../content", "create_posts").is_err());
    }
}
