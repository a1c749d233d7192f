pub mod error;
pub mod handler;
pub mod identity;
pub mod local;
pub mod registry;
pub mod wait;

pub use error::HandlerError;
pub use handler::{validate_filters, MigrationHandler, SubMigrate};
pub use identity::{identity_create_params, push_identity_dependencies, IdentityParams};
pub use local::LocalHandler;
pub use registry::HandlerRegistry;
pub use wait::{wait_for_status, WaitOpts};
