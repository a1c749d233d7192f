use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::record::{Migration, MigrationFilter};

/// Durable record store for migration attempts.
///
/// The orchestrator is the only writer; `list`/`show` style readers may query
/// concurrently. Writes are durable before the call returns.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Upsert a record. Assigns `uuid` and `created_at` on first save and
    /// bumps `updated_at` on every save.
    ///
    /// Rejects with [`LedgerError::UniqueViolation`] when saving would leave
    /// two non-archived records for the same `(resource_type, source_id)`
    /// both in a migrated status.
    async fn save(&self, record: &mut Migration) -> Result<(), LedgerError>;

    /// Records matching the conjunctive filter, newest first.
    async fn query(&self, filter: &MigrationFilter) -> Result<Vec<Migration>, LedgerError>;

    async fn get(&self, uuid: Uuid) -> Result<Option<Migration>, LedgerError>;

    /// Permanent removal (administrative).
    async fn delete(&self, uuid: Uuid) -> Result<(), LedgerError>;

    /// Hide a record from default queries.
    async fn archive(&self, uuid: Uuid) -> Result<(), LedgerError>;

    /// Undo [`Ledger::archive`].
    async fn unarchive(&self, uuid: Uuid) -> Result<(), LedgerError>;
}

/// Shared invariant check used by both backends before committing a save:
/// no two active records for one `(type, source_id)` may both claim a
/// migrated status.
pub(crate) fn check_unique_active(
    record: &Migration,
    existing: &[Migration],
) -> Result<(), LedgerError> {
    if record.archived || !record.status.is_migrated() {
        return Ok(());
    }
    for other in existing {
        if other.uuid == record.uuid || other.archived {
            continue;
        }
        if other.resource_type == record.resource_type
            && other.source_id == record.source_id
            && other.status.is_migrated()
        {
            return Err(LedgerError::UniqueViolation {
                resource_type: record.resource_type.to_string(),
                source_id: record.source_id.clone(),
                existing: other
                    .uuid
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unsaved>".into()),
            });
        }
    }
    Ok(())
}
