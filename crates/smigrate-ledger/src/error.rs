use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store could not be opened, read or committed. Callers
    /// abort: there is no safe way to continue without the ledger.
    #[error("ledger storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration not found: {0}")]
    NotFound(String),

    #[error(
        "duplicate active migration for {resource_type} {source_id}: \
         {existing} already holds a migrated status"
    )]
    UniqueViolation {
        resource_type: String,
        source_id: String,
        existing: String,
    },
}
