use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{check_unique_active, Ledger};
use crate::record::{sort_newest_first, Migration, MigrationFilter};

/// In-memory implementation of [`Ledger`].
///
/// All data is lost on process exit. Suitable for tests and dry-run tooling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<HashMap<Uuid, Migration>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn set_archived(&self, uuid: Uuid, archived: bool) -> Result<(), LedgerError> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(&uuid)
            .ok_or_else(|| LedgerError::NotFound(uuid.to_string()))?;
        record.archived = archived;
        record.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn save(&self, record: &mut Migration) -> Result<(), LedgerError> {
        let now = Utc::now();
        if record.uuid.is_none() {
            record.uuid = Some(Uuid::new_v4());
            record.created_at = Some(now);
        }
        record.updated_at = Some(now);

        let mut guard = self.inner.write().await;
        let existing: Vec<Migration> = guard.values().cloned().collect();
        check_unique_active(record, &existing)?;
        guard.insert(record.uuid.unwrap(), record.clone());
        Ok(())
    }

    async fn query(&self, filter: &MigrationFilter) -> Result<Vec<Migration>, LedgerError> {
        let guard = self.inner.read().await;
        let mut records: Vec<Migration> = guard
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get(&self, uuid: Uuid) -> Result<Option<Migration>, LedgerError> {
        let guard = self.inner.read().await;
        Ok(guard.get(&uuid).cloned())
    }

    async fn delete(&self, uuid: Uuid) -> Result<(), LedgerError> {
        let mut guard = self.inner.write().await;
        guard
            .remove(&uuid)
            .map(|_| ())
            .ok_or_else(|| LedgerError::NotFound(uuid.to_string()))
    }

    async fn archive(&self, uuid: Uuid) -> Result<(), LedgerError> {
        self.set_archived(uuid, true).await
    }

    async fn unarchive(&self, uuid: Uuid) -> Result<(), LedgerError> {
        self.set_archived(uuid, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MigrationStatus;
    use smigrate_domain::ResourceType;

    fn dummy_record(ty: &str, source_id: &str) -> Migration {
        Migration::new("svc", ResourceType::new(ty), "src", "dst", source_id)
    }

    #[tokio::test]
    async fn save_and_query_by_resource() {
        let ledger = InMemoryLedger::new();
        let mut a = dummy_record("volume", "vol-1");
        let mut b = dummy_record("network", "net-1");
        ledger.save(&mut a).await.unwrap();
        ledger.save(&mut b).await.unwrap();

        let found = ledger
            .query(&MigrationFilter::by_resource(
                &ResourceType::new("volume"),
                "vol-1",
            ))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_id, "vol-1");
    }

    #[tokio::test]
    async fn query_returns_newest_first() {
        let ledger = InMemoryLedger::new();
        let mut a = dummy_record("volume", "vol-old");
        ledger.save(&mut a).await.unwrap();
        // Make the ordering unambiguous even on coarse clocks.
        {
            let mut guard = ledger.inner.write().await;
            let rec = guard.get_mut(&a.uuid.unwrap()).unwrap();
            rec.created_at = Some(Utc::now() - chrono::Duration::seconds(60));
        }
        let mut b = dummy_record("volume", "vol-new");
        ledger.save(&mut b).await.unwrap();

        let all = ledger.query(&MigrationFilter::default()).await.unwrap();
        assert_eq!(all[0].source_id, "vol-new");
        assert_eq!(all[1].source_id, "vol-old");
    }

    #[tokio::test]
    async fn unique_violation_on_second_active() {
        let ledger = InMemoryLedger::new();
        let mut first = dummy_record("volume", "vol-1");
        first.status = MigrationStatus::Completed;
        ledger.save(&mut first).await.unwrap();

        let mut second = dummy_record("volume", "vol-1");
        second.status = MigrationStatus::PendingCleanup;
        assert!(matches!(
            ledger.save(&mut second).await,
            Err(LedgerError::UniqueViolation { .. })
        ));

        // A non-migrated status for the same pair is fine (e.g. a retry
        // after archiving would start at InProgress).
        let mut third = dummy_record("volume", "vol-1");
        third.status = MigrationStatus::Failed;
        ledger.save(&mut third).await.unwrap();
    }
}
