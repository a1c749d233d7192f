use std::io::Write;

use smigrate_config::{LogLevel, MigrateConfig};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_are_usable() {
    let config = MigrateConfig::default();
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.log_console);
    assert!(!config.multitenant_mode);
    assert_eq!(config.member_role_name, "member");
    assert_eq!(config.image_transfer_chunk_size, 32 * 1024 * 1024);
    assert_eq!(config.volume_upload_timeout, 1800);
    assert!(!config.preserve_volume_type);
    assert!(config.preserve_share_access_rules);
    assert!(config.source_cloud_name.is_none());
}

#[test]
fn yaml_overrides_defaults() {
    let file = write_config(
        r#"
source_cloud_name: charmed
destination_cloud_name: sunbeam
cloud_config_file: /etc/openstack/clouds.yaml
log_level: debug
multitenant_mode: true
preserve_volume_type: true
volume_upload_timeout: 3600
"#,
    );

    let config = MigrateConfig::load(file.path()).expect("should load without error");
    assert_eq!(config.source_cloud_name.as_deref(), Some("charmed"));
    assert_eq!(config.destination_cloud_name.as_deref(), Some("sunbeam"));
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.multitenant_mode);
    assert!(config.preserve_volume_type);
    assert_eq!(config.volume_upload_timeout, 3600);
    // Untouched keys keep their defaults.
    assert_eq!(config.image_transfer_chunk_size, 32 * 1024 * 1024);
}

#[test]
fn empty_file_yields_defaults() {
    let file = write_config("");
    let config = MigrateConfig::load(file.path()).expect("empty config should load");
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn unknown_key_rejected() {
    let file = write_config("no_such_option: true\n");
    assert!(MigrateConfig::load(file.path()).is_err());
}

#[test]
fn missing_file_returns_error() {
    let path = std::path::Path::new("/nonexistent/path/does/not/exist.yaml");
    assert!(MigrateConfig::load(path).is_err());
}
