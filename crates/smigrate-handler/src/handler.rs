use std::collections::HashMap;

use async_trait::async_trait;
use smigrate_domain::{Dependency, IdMap, MigrateOptions, MigratedDependency, ResourceType};

use crate::error::HandlerError;

/// Capability handed to handlers for requesting auxiliary migrations.
///
/// Some transfers go through an intermediate resource of another type: a
/// volume is uploaded to an image, the image is migrated, and the volume is
/// recreated from it on the destination. The handler asks the core to run
/// that inner migration; the request goes through the same idempotency gate
/// and ledger as any other.
#[async_trait]
pub trait SubMigrate: Send + Sync {
    async fn migrate(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<MigratedDependency, HandlerError>;
}

/// The per-resource-type adapter contract.
///
/// A conforming handler never touches the ledger, leaves no destination
/// side-effects when `migrate` fails, tolerates a second `delete_source`
/// after a successful one, and reports a vanished source resource as
/// [`HandlerError::NotFound`] rather than a generic failure.
#[async_trait]
pub trait MigrationHandler: Send + Sync + 'static {
    /// Short service name used for display and grouping (e.g. `network`,
    /// `block-storage`).
    fn service_tag(&self) -> &'static str;

    /// Resource types this handler may report as prerequisites.
    fn associated_types(&self) -> Vec<ResourceType> {
        vec![]
    }

    /// Resource types this handler contains (migrations cascade into these).
    fn member_types(&self) -> Vec<ResourceType> {
        vec![]
    }

    /// Query keys accepted by [`MigrationHandler::list_ids`].
    fn supported_filters(&self) -> Vec<String> {
        vec![]
    }

    /// The prerequisites of one concrete resource, in migration order.
    async fn associated(&self, _source_id: &str) -> Result<Vec<Dependency>, HandlerError> {
        Ok(vec![])
    }

    /// The contained resources of one concrete resource, in migration order.
    async fn members(&self, _source_id: &str) -> Result<Vec<Dependency>, HandlerError> {
        Ok(vec![])
    }

    /// Enumerate source resource ids matching the filters (batch selection).
    async fn list_ids(
        &self,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<String>, HandlerError>;

    /// Create the equivalent resource on the destination cloud and return its
    /// id. Foreign references in the constructed body are rewritten through
    /// `deps`. Partial destination state left by a failure is the handler's
    /// to clean up before returning the error.
    async fn migrate(
        &self,
        source_id: &str,
        deps: &IdMap,
        core: &dyn SubMigrate,
    ) -> Result<String, HandlerError>;

    /// Post-step run after member resources were migrated (e.g. attaching
    /// interfaces to a router). Receives only the members that succeeded.
    async fn connect_members(
        &self,
        _parent_destination_id: &str,
        _members: &[MigratedDependency],
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Remove the resource from the source cloud. Must be idempotent.
    async fn delete_source(&self, source_id: &str) -> Result<(), HandlerError>;
}

impl std::fmt::Debug for dyn MigrationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationHandler")
            .field("service_tag", &self.service_tag())
            .finish_non_exhaustive()
    }
}

/// Reject filter keys the handler does not support.
pub fn validate_filters(
    handler: &dyn MigrationHandler,
    filters: &HashMap<String, String>,
) -> Result<(), HandlerError> {
    let supported = handler.supported_filters();
    for key in filters.keys() {
        if !supported.contains(key) {
            return Err(HandlerError::InvalidFilter {
                key: key.clone(),
                supported: supported.clone(),
            });
        }
    }
    Ok(())
}
