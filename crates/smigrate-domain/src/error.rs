use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(
        "no migrated dependency on file for {resource_type} {source_id}; \
         migrate it first or rerun with --include-dependencies"
    )]
    MissingDependency {
        resource_type: String,
        source_id: String,
    },

    #[error("invalid resource type: {0}")]
    InvalidResourceType(String),
}
