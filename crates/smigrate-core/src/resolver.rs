use smigrate_domain::Dependency;
use smigrate_handler::MigrationHandler;
use smigrate_ledger::{Ledger, Migration, MigrationFilter};
use tracing::debug;

use crate::error::MigrateError;

/// The handler-reported dependencies of one resource, split by ledger state.
///
/// Both lists keep the handler-provided order: the handler returns
/// associations in a semantically meaningful sequence (network before
/// subnet), and recursive migration must follow it.
#[derive(Debug, Default)]
pub struct PartitionedDependencies {
    /// Dependencies with a ledger record in a migrated status.
    pub migrated: Vec<Migration>,
    /// Everything else: no record, `IN_PROGRESS`, or `FAILED`.
    pub pending: Vec<Dependency>,
}

impl PartitionedDependencies {
    pub fn pending_summary(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|d| format!("{} {}", d.resource_type, d.source_id))
            .collect()
    }
}

/// Ask the handler for the resource's associated (prerequisite) resources and
/// partition them against the ledger.
pub async fn partition_dependencies(
    ledger: &dyn Ledger,
    handler: &dyn MigrationHandler,
    source_id: &str,
) -> Result<PartitionedDependencies, MigrateError> {
    let associated = handler.associated(source_id).await?;

    let mut partitioned = PartitionedDependencies::default();
    for dependency in associated {
        let records = ledger
            .query(&MigrationFilter::by_resource(
                &dependency.resource_type,
                &dependency.source_id,
            ))
            .await?;
        match records.into_iter().next() {
            Some(record) if record.is_migrated() => partitioned.migrated.push(record),
            _ => partitioned.pending.push(dependency),
        }
    }

    debug!(
        source_id = %source_id,
        migrated = partitioned.migrated.len(),
        pending = partitioned.pending.len(),
        "partitioned associated resources"
    );
    Ok(partitioned)
}
