use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive equivalent of this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Tool configuration, loaded from the YAML file named by
/// `SUNBEAM_MIGRATE_CONFIG` (or `--config`). Every field has a default so an
/// empty file (or no file at all) yields a usable read-only configuration;
/// the cloud names and credentials file are only demanded once an actual
/// migration starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MigrateConfig {
    pub log_level: LogLevel,
    pub log_dir: Option<PathBuf>,
    /// Whether to log to the console in addition to `log_dir`.
    pub log_console: bool,

    /// Credentials file covering both clouds.
    pub cloud_config_file: Option<PathBuf>,
    pub source_cloud_name: Option<String>,
    pub destination_cloud_name: Option<String>,

    /// Ledger location.
    pub database_file: PathBuf,

    /// Staging area for mounts and intermediate transfers.
    pub temporary_migration_dir: Option<PathBuf>,

    /// Treat identity resources (project, user) as additional dependencies
    /// and create destination resources under the mapped owner.
    pub multitenant_mode: bool,
    /// Identity role granted to requester-scoped sessions.
    pub member_role_name: String,

    // Transfer knobs.
    pub image_transfer_chunk_size: u64,
    /// Seconds to wait for a volume upload/creation to reach a terminal state.
    pub volume_upload_timeout: u64,
    /// Seconds to wait for other asynchronous destination creations.
    pub resource_creation_timeout: u64,

    // Preservation toggles. Defaults favour compatibility over fidelity:
    // source-specific settings (types, zones, provider ids) often have no
    // destination equivalent.
    pub preserve_volume_type: bool,
    pub preserve_volume_availability_zone: bool,
    pub preserve_instance_availability_zone: bool,
    pub preserve_load_balancer_availability_zone: bool,
    pub preserve_share_type: bool,
    pub preserve_share_access_rules: bool,
    pub preserve_network_segmentation_id: bool,
    pub preserve_port_mac_address: bool,
    pub preserve_port_floating_ip: bool,
    pub preserve_port_floating_ip_address: bool,
    pub preserve_port_fixed_ips: bool,
    pub preserve_router_ip: bool,
    pub preserve_router_availability_zone: bool,

    /// Explicit local IP to use when adding temporary share-access rules.
    pub manila_local_access_ip: Option<String>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            log_console: true,
            cloud_config_file: None,
            source_cloud_name: None,
            destination_cloud_name: None,
            database_file: default_database_file(),
            temporary_migration_dir: None,
            multitenant_mode: false,
            member_role_name: "member".to_string(),
            image_transfer_chunk_size: 32 * 1024 * 1024,
            volume_upload_timeout: 1800,
            resource_creation_timeout: 600,
            preserve_volume_type: false,
            preserve_volume_availability_zone: false,
            preserve_instance_availability_zone: false,
            preserve_load_balancer_availability_zone: false,
            preserve_share_type: false,
            preserve_share_access_rules: true,
            preserve_network_segmentation_id: false,
            preserve_port_mac_address: false,
            preserve_port_floating_ip: false,
            preserve_port_floating_ip_address: false,
            preserve_port_fixed_ips: false,
            preserve_router_ip: false,
            preserve_router_availability_zone: false,
            manila_local_access_ip: None,
        }
    }
}

fn default_database_file() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home)
        .join(".local/share/sunbeam-migrate")
        .join("ledger.redb")
}
