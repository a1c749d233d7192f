mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use smigrate_config::{load_config, MigrateConfig};
use smigrate_domain::MigrateOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_logging(&config, cli.debug)?;
    tracing::debug!(
        "command: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );

    match cli.command {
        Command::Start {
            resource_type,
            resource_id,
            dry_run,
            cleanup_source,
            include_dependencies,
            include_members,
        } => {
            let options = MigrateOptions {
                dry_run,
                cleanup_source,
                include_dependencies,
                include_members,
            };
            commands::start(&config, resource_type, resource_id, options).await
        }
        Command::StartBatch {
            resource_type,
            filters,
            migrate_all,
            dry_run,
            cleanup_source,
            include_dependencies,
            include_members,
        } => {
            let options = MigrateOptions {
                dry_run,
                cleanup_source,
                include_dependencies,
                include_members,
            };
            commands::start_batch(&config, resource_type, filters, migrate_all, options).await
        }
        Command::List {
            service,
            resource_type,
            status,
            source_id,
            archived,
            include_archived,
            external,
            source_removed,
            exclude_source_removed,
            format,
        } => {
            commands::list(
                &config,
                service,
                resource_type,
                status,
                source_id,
                archived,
                include_archived,
                external,
                source_removed,
                exclude_source_removed,
                format,
            )
            .await
        }
        Command::Show {
            migration_id,
            format,
        } => commands::show(&config, migration_id, format).await,
        Command::Delete {
            migration_ids,
            purge,
        } => commands::delete(&config, migration_ids, purge).await,
        Command::Restore { migration_ids } => commands::restore(&config, migration_ids).await,
        Command::CleanupSource {
            resource_type,
            source_id,
        } => commands::cleanup_source(&config, resource_type, source_id).await,
        Command::RegisterExternal {
            resource_type,
            source_resource_id,
            destination_resource_id,
        } => {
            commands::register_external(
                &config,
                resource_type,
                source_resource_id,
                destination_resource_id,
            )
            .await
        }
        Command::Capabilities { resource_type } => commands::capabilities(resource_type),
    }
}

/// Wire up console and file logging from the configuration.
///
/// `RUST_LOG` wins when set; `--debug` overrides the configured level. The
/// returned guard keeps the file writer flushing until exit.
fn init_logging(
    config: &MigrateConfig,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = if debug {
        "debug"
    } else {
        config.log_level.as_filter()
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = config
        .log_console
        .then(|| fmt::layer().with_target(false));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, "sunbeam-migrate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
