use smigrate_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// A source resource does not exist (anymore). Kept distinct so the
    /// caller can tell a vanished resource from a transient API failure.
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("no migration handler registered for resource type: {0}")]
    UnsupportedType(String),

    #[error("invalid resource filter: {key}, supported filters: {supported:?}")]
    InvalidFilter { key: String, supported: Vec<String> },

    #[error("timed out after {0:?} waiting for resource status")]
    Timeout(std::time::Duration),

    #[error("resource entered terminal status {status:?} while waiting for {expected:?}")]
    StatusFailure { status: String, expected: String },

    #[error(transparent)]
    MissingDependency(#[from] DomainError),

    /// An auxiliary migration requested through the core failed.
    #[error("auxiliary migration failed: {0}")]
    SubMigration(String),

    /// Remote API failure the handler cannot classify further.
    #[error("{0}")]
    Api(String),
}
