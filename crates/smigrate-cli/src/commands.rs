use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use smigrate_config::MigrateConfig;
use smigrate_core::Orchestrator;
use smigrate_domain::{MigrateOptions, ResourceType};
use smigrate_handler::{HandlerRegistry, LocalHandler};
use smigrate_ledger::{Ledger, MigrationFilter, MigrationStatus, RedbLedger};
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::output;

/// Build the handler registry.
///
/// Cloud-specific handlers get wired up here as they are implemented; the
/// `local` stub is always present so the command surface can be exercised
/// without cloud credentials.
pub fn build_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry.register("local", Arc::new(LocalHandler::new("local")));
    Arc::new(registry)
}

pub fn open_ledger(config: &MigrateConfig) -> Result<Arc<dyn Ledger>> {
    let ledger = RedbLedger::open(&config.database_file).with_context(|| {
        format!(
            "failed to open the migration ledger at {}",
            config.database_file.display()
        )
    })?;
    Ok(Arc::new(ledger))
}

fn build_orchestrator(config: &MigrateConfig) -> Result<Orchestrator> {
    let ledger = open_ledger(config)?;
    Ok(Orchestrator::new(ledger, build_registry(), config)?)
}

// ── start ─────────────────────────────────────────────────────────────────────

pub async fn start(
    config: &MigrateConfig,
    resource_type: String,
    resource_id: String,
    options: MigrateOptions,
) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let migration = orchestrator
        .migrate(&ResourceType::new(resource_type), &resource_id, options)
        .await?;

    if options.dry_run {
        println!("Dry run complete.");
    } else {
        println!(
            "Migrated {} {} -> {} (migration {}, status {})",
            migration.resource_type,
            migration.source_id,
            migration.destination_id.as_deref().unwrap_or("-"),
            migration
                .uuid
                .map(|u| u.to_string())
                .unwrap_or_else(|| "-".into()),
            migration.status,
        );
    }
    Ok(())
}

// ── start-batch ───────────────────────────────────────────────────────────────

pub async fn start_batch(
    config: &MigrateConfig,
    resource_type: String,
    raw_filters: Vec<String>,
    migrate_all: bool,
    options: MigrateOptions,
) -> Result<()> {
    if raw_filters.is_empty() && !migrate_all {
        bail!("no filters specified; pass --all to migrate all resources");
    }

    let mut filters: HashMap<String, String> = HashMap::new();
    for raw in &raw_filters {
        let Some((key, value)) = raw.split_once(':') else {
            bail!("invalid resource filter, expecting 'key:value' arguments: {raw}");
        };
        filters.insert(key.replace('-', "_"), value.to_string());
    }

    let orchestrator = build_orchestrator(config)?;
    let report = orchestrator
        .migrate_batch(&ResourceType::new(resource_type), &filters, options)
        .await?;

    println!(
        "{} migrated, {} skipped, {} failed{}.",
        report.migrated.len(),
        report.skipped.len(),
        report.errors.len(),
        if report.dry_run { " (dry run)" } else { "" },
    );
    if report.has_errors() {
        eprintln!("\n{} error(s):", report.errors.len());
        for error in &report.errors {
            eprintln!("  ! {}", error);
        }
        bail!("batch migration completed with errors");
    }
    Ok(())
}

// ── list / show ───────────────────────────────────────────────────────────────

pub async fn list(
    config: &MigrateConfig,
    service: Option<String>,
    resource_type: Option<String>,
    status: Option<String>,
    source_id: Option<String>,
    archived: bool,
    include_archived: bool,
    external: bool,
    source_removed: bool,
    exclude_source_removed: bool,
    format: OutputFormat,
) -> Result<()> {
    if source_removed && exclude_source_removed {
        bail!("both --source-removed and --exclude-source-removed flags were specified");
    }

    let status = status
        .map(|s| s.parse::<MigrationStatus>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let filter = MigrationFilter {
        service,
        resource_type: resource_type.map(ResourceType::new),
        source_id,
        status,
        external: external.then_some(true),
        source_removed: if source_removed {
            Some(true)
        } else if exclude_source_removed {
            Some(false)
        } else {
            None
        },
        archived_only: archived,
        include_archived,
        ..Default::default()
    };

    let ledger = open_ledger(config)?;
    let migrations = ledger.query(&filter).await?;

    match format {
        OutputFormat::Table => print!("{}", output::render_migrations_table(&migrations)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&migrations)?),
    }
    Ok(())
}

pub async fn show(
    config: &MigrateConfig,
    migration_id: String,
    format: OutputFormat,
) -> Result<()> {
    let uuid = Uuid::parse_str(&migration_id)
        .with_context(|| format!("invalid migration id: {migration_id}"))?;

    let ledger = open_ledger(config)?;
    let migration = ledger
        .get(uuid)
        .await?
        .with_context(|| format!("could not find the specified migration: {migration_id}"))?;

    match format {
        OutputFormat::Table => print!("{}", output::render_migration_detail(&migration)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&migration)?),
    }
    Ok(())
}

// ── delete / restore ──────────────────────────────────────────────────────────

pub async fn delete(
    config: &MigrateConfig,
    migration_ids: Vec<String>,
    purge: bool,
) -> Result<()> {
    if migration_ids.is_empty() {
        bail!("no migration ids specified");
    }
    let ledger = open_ledger(config)?;
    for id in &migration_ids {
        let uuid = Uuid::parse_str(id).with_context(|| format!("invalid migration id: {id}"))?;
        if purge {
            ledger.delete(uuid).await?;
            println!("Deleted migration {}", id);
        } else {
            ledger.archive(uuid).await?;
            println!("Archived migration {}", id);
        }
    }
    Ok(())
}

pub async fn restore(config: &MigrateConfig, migration_ids: Vec<String>) -> Result<()> {
    if migration_ids.is_empty() {
        bail!("no migration ids specified");
    }
    let ledger = open_ledger(config)?;
    for id in &migration_ids {
        let uuid = Uuid::parse_str(id).with_context(|| format!("invalid migration id: {id}"))?;
        ledger.unarchive(uuid).await?;
        println!("Restored migration {}", id);
    }
    Ok(())
}

// ── cleanup-source / register-external ───────────────────────────────────────

pub async fn cleanup_source(
    config: &MigrateConfig,
    resource_type: String,
    source_id: String,
) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let migration = orchestrator
        .retry_cleanup(&ResourceType::new(resource_type), &source_id)
        .await?;
    println!(
        "Source cleaned up for {} {} (migration {})",
        migration.resource_type,
        migration.source_id,
        migration
            .uuid
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".into()),
    );
    Ok(())
}

pub async fn register_external(
    config: &MigrateConfig,
    resource_type: String,
    source_resource_id: String,
    destination_resource_id: String,
) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let migration = orchestrator
        .register_external(
            &ResourceType::new(resource_type),
            &source_resource_id,
            &destination_resource_id,
        )
        .await?;
    println!(
        "Registered external migration {} for {} {} -> {}",
        migration
            .uuid
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".into()),
        migration.resource_type,
        migration.source_id,
        migration.destination_id.as_deref().unwrap_or("-"),
    );
    Ok(())
}

// ── capabilities ──────────────────────────────────────────────────────────────

pub fn capabilities(resource_type: Option<String>) -> Result<()> {
    let registry = build_registry();
    match resource_type {
        Some(resource_type) => {
            let detail =
                output::render_capability_detail(&registry, &ResourceType::new(resource_type))?;
            print!("{}", detail);
        }
        None => print!("{}", output::render_capabilities_table(&registry)),
    }
    Ok(())
}
