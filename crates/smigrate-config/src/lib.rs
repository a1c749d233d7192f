pub mod config;
pub mod error;
pub mod loader;

pub use config::{LogLevel, MigrateConfig};
pub use error::ConfigError;
pub use loader::{load_config, CONFIG_ENV_VAR};
