use smigrate_handler::HandlerError;
use smigrate_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unsupported resource type: {0}")]
    UnsupportedType(String),

    #[error("invalid resource filter: {0}")]
    InvalidFilter(String),

    #[error(
        "the {resource_type} resource ({source_id}) has pending associated resources: \
         {pending:?}; specify --include-dependencies to migrate them automatically \
         or run separate start commands"
    )]
    DependenciesPending {
        resource_type: String,
        source_id: String,
        pending: Vec<String>,
    },

    #[error(
        "associated {resource_type} resource {source_id} has an in-progress migration \
         ({uuid}) owned by another run; wait for it or delete the stale record"
    )]
    ConcurrentOrStuck {
        resource_type: String,
        source_id: String,
        uuid: String,
    },

    #[error("migration handler failed: {0}")]
    HandlerFailure(String),

    #[error("source cleanup failed: {0}")]
    SourceCleanupFailed(String),

    /// Ledger state contradicts what the resolver just observed. Not
    /// recoverable automatically; an operator has to inspect the ledger.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Storage(#[from] LedgerError),
}

impl From<HandlerError> for MigrateError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::NotFound(what) => MigrateError::NotFound(what),
            HandlerError::UnsupportedType(ty) => MigrateError::UnsupportedType(ty),
            HandlerError::InvalidFilter { .. } => MigrateError::InvalidFilter(err.to_string()),
            other => MigrateError::HandlerFailure(other.to_string()),
        }
    }
}
