use std::sync::Arc;

use anyhow::Context;
use dbmigrator::{DefaultDatabaseSource, ExecutionReport, Migrator, MigratorConfig, TRACKING_TABLE};
use tracing::{info, warn};

use crate::args::Cli;

/// Load configuration, resolve databases and run the selected actions
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = MigratorConfig::load(cli.config_path())
        .with_context(|| format!("Failed to load configuration from {}", cli.config_path().display()))?;

    let databases = cli.resolve_databases(config.migrator.default_database.as_deref());
    if databases.is_empty() {
        warn!(target: "dbmigrator", "No databases named and no default_database configured");
        return Ok(());
    }

    let root = cli.resolve_root(&config.migrator);
    let platform = cli.resolve_platform(&config.migrator);
    info!(target: "dbmigrator", "Using {} scripts under {}", platform, root.display());

    let source = DefaultDatabaseSource::from_config(config, root);
    let mut migrator = Migrator::new(Arc::new(source), platform.handler());

    let report = execute(&mut migrator, &cli, &databases).await?;
    println!(
        "{} script(s) executed, {} already applied ({}ms)",
        report.executed_count(),
        report.skipped_count(),
        report.execution_time_ms
    );

    if cli.list {
        list_applied(&mut migrator, &databases).await?;
    }
    Ok(())
}

/// Run the actions selected on the command line against `databases`
pub async fn execute(migrator: &mut Migrator, cli: &Cli, databases: &[String]) -> anyhow::Result<ExecutionReport> {
    let actions = cli.actions();
    if actions.is_empty() {
        return Ok(ExecutionReport::default());
    }

    migrator
        .run_actions(&actions, databases)
        .await
        .with_context(|| format!("Migration of {} failed", databases.join(", ")))
}

async fn list_applied(migrator: &mut Migrator, databases: &[String]) -> anyhow::Result<()> {
    for db in databases {
        let records = migrator
            .applied_scripts(db)
            .await
            .with_context(|| format!("Failed to read {} for {}", TRACKING_TABLE, db))?;

        println!("{} ({} applied):", db, records.len());
        for record in records {
            println!("  {}  {}", record.applied_at.format("%Y-%m-%d %H:%M:%S"), record.script_name);
        }
    }
    Ok(())
}
