use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sunbeam-migrate",
    about = "Migrate resources between two cloud control planes",
    version
)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short = 'c', long = "config", env = "SUNBEAM_MIGRATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate an individual resource.
    Start {
        /// The migrated resource type (e.g. image, secret).
        #[arg(long)]
        resource_type: String,

        resource_id: String,

        /// Only log the steps to be executed, skipping migrations.
        #[arg(long)]
        dry_run: bool,

        /// Cleanup the resources on the source side if the migration succeeds.
        #[arg(long)]
        cleanup_source: bool,

        /// Automatically migrate associated resources.
        #[arg(long)]
        include_dependencies: bool,

        /// Automatically migrate member resources (contained resources).
        #[arg(long)]
        include_members: bool,
    },

    /// Migrate multiple resources that match the filters.
    StartBatch {
        /// The migrated resource type (e.g. image, secret).
        #[arg(long)]
        resource_type: String,

        /// One or more `key:value` filters used to select the resources.
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Migrate all resources.
        #[arg(long = "all")]
        migrate_all: bool,

        /// Only log the steps to be executed, skipping migrations.
        #[arg(long)]
        dry_run: bool,

        /// Cleanup the resources on the source side if the migration succeeds.
        #[arg(long)]
        cleanup_source: bool,

        /// Automatically migrate associated resources.
        #[arg(long)]
        include_dependencies: bool,

        /// Automatically migrate member resources (contained resources).
        #[arg(long)]
        include_members: bool,
    },

    /// List migrations.
    List {
        /// Filter by service name.
        #[arg(long)]
        service: Option<String>,

        /// Filter by resource type.
        #[arg(long)]
        resource_type: Option<String>,

        /// Filter by migration status.
        #[arg(long)]
        status: Option<String>,

        /// Filter by source resource id.
        #[arg(long)]
        source_id: Option<String>,

        /// Only show archived migrations.
        #[arg(long)]
        archived: bool,

        /// Include archived migrations.
        #[arg(long)]
        include_archived: bool,

        /// Only show external migrations.
        #[arg(long)]
        external: bool,

        /// Only show resources cleaned up from the source.
        #[arg(long)]
        source_removed: bool,

        /// Exclude resources cleaned up from the source.
        #[arg(long)]
        exclude_source_removed: bool,

        /// Set the output format.
        #[arg(short = 'f', long = "format", default_value = "table")]
        format: OutputFormat,
    },

    /// Show migration information.
    Show {
        migration_id: String,

        /// Set the output format.
        #[arg(short = 'f', long = "format", default_value = "table")]
        format: OutputFormat,
    },

    /// Archive migrations, hiding them from default queries.
    Delete {
        migration_ids: Vec<String>,

        /// Permanently remove the records instead of archiving them.
        #[arg(long)]
        purge: bool,
    },

    /// Restore archived migrations.
    Restore { migration_ids: Vec<String> },

    /// Retry the source cleanup for a prior migration.
    CleanupSource {
        /// The migrated resource type (e.g. image, secret).
        #[arg(long)]
        resource_type: String,

        /// The source resource id.
        #[arg(long)]
        source_id: String,
    },

    /// Register a migration that was performed externally.
    RegisterExternal {
        /// The migrated resource type (e.g. image, secret).
        #[arg(long)]
        resource_type: String,

        source_resource_id: String,
        destination_resource_id: String,
    },

    /// Describe migration capabilities.
    Capabilities {
        /// Migration capabilities for a given resource type.
        #[arg(long)]
        resource_type: Option<String>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
