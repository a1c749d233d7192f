use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use smigrate_domain::{IdMap, MigratedDependency};
use tracing::debug;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::handler::{validate_filters, MigrationHandler, SubMigrate};

/// A stub handler that simulates migrations locally.
///
/// - Fabricates destination ids; performs no remote I/O.
/// - Records every mutating call, so tests can assert on call counts.
/// - `delete_source` is idempotent, matching the handler contract.
///
/// The CLI registers it under the `local` resource type so the command
/// surface can be exercised without cloud credentials.
#[derive(Debug, Default)]
pub struct LocalHandler {
    service: &'static str,
    calls: Mutex<Vec<String>>,
}

impl LocalHandler {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mutating calls seen so far, as `"<method> <source_id>"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &str, source_id: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", method, source_id));
    }
}

#[async_trait]
impl MigrationHandler for LocalHandler {
    fn service_tag(&self) -> &'static str {
        self.service
    }

    async fn list_ids(
        &self,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<String>, HandlerError> {
        validate_filters(self, filters)?;
        Ok(vec![])
    }

    async fn migrate(
        &self,
        source_id: &str,
        deps: &IdMap,
        _core: &dyn SubMigrate,
    ) -> Result<String, HandlerError> {
        debug!(source_id = %source_id, deps = deps.len(), "LocalHandler: migrate");
        self.record("migrate", source_id);
        Ok(format!("local-{}", Uuid::new_v4()))
    }

    async fn connect_members(
        &self,
        parent_destination_id: &str,
        members: &[MigratedDependency],
    ) -> Result<(), HandlerError> {
        debug!(
            parent = %parent_destination_id,
            members = members.len(),
            "LocalHandler: connect_members"
        );
        self.record("connect_members", parent_destination_id);
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), HandlerError> {
        debug!(source_id = %source_id, "LocalHandler: delete_source");
        self.record("delete_source", source_id);
        Ok(())
    }
}
