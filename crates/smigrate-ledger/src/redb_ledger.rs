use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{check_unique_active, Ledger};
use crate::record::{sort_newest_first, Migration, MigrationFilter};

const MIGRATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("migrations");

/// Persistent ledger backed by a redb database file.
///
/// Commits are fsynced before `save` returns, so a record is on disk before
/// any destination write that depends on it. redb holds an exclusive lock on
/// the file for the lifetime of the process; concurrent `sunbeam-migrate`
/// invocations against the same ledger file are not supported.
#[derive(Clone)]
pub struct RedbLedger {
    db: Arc<Database>,
}

impl RedbLedger {
    /// Open (or create) the ledger at `path`.
    ///
    /// Parent directories are created automatically.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        }
        let db = Database::create(path)
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;

        // Ensure the table exists
        {
            let wtxn = db
                .begin_write()
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
            wtxn.open_table(MIGRATIONS)
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
            wtxn.commit()
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn load_all(&self) -> Result<Vec<Migration>, LedgerError> {
        let rtxn = self
            .db
            .begin_read()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        let table = rtxn
            .open_table(MIGRATIONS)
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        let mut records = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?
        {
            let (_k, v) = entry.map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
            let record: Migration = serde_json::from_slice(v.value())?;
            records.push(record);
        }
        Ok(records)
    }

    fn put(&self, record: &Migration) -> Result<(), LedgerError> {
        let uuid = record
            .uuid
            .ok_or_else(|| LedgerError::StorageUnavailable("record without uuid".into()))?;
        let key = uuid.to_string();
        let bytes = serde_json::to_vec(record)?;
        let wtxn = self
            .db
            .begin_write()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        {
            let mut table = wtxn
                .open_table(MIGRATIONS)
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        }
        wtxn.commit()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))
    }

    fn set_archived(&self, uuid: Uuid, archived: bool) -> Result<(), LedgerError> {
        let mut record = self
            .get_sync(uuid)?
            .ok_or_else(|| LedgerError::NotFound(uuid.to_string()))?;
        record.archived = archived;
        record.updated_at = Some(Utc::now());
        self.put(&record)
    }

    fn get_sync(&self, uuid: Uuid) -> Result<Option<Migration>, LedgerError> {
        let rtxn = self
            .db
            .begin_read()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        let table = rtxn
            .open_table(MIGRATIONS)
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        match table
            .get(uuid.to_string().as_str())
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?
        {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Ledger for RedbLedger {
    async fn save(&self, record: &mut Migration) -> Result<(), LedgerError> {
        let now = Utc::now();
        if record.uuid.is_none() {
            record.uuid = Some(Uuid::new_v4());
            record.created_at = Some(now);
        }
        record.updated_at = Some(now);

        let existing = self.load_all()?;
        check_unique_active(record, &existing)?;
        self.put(record)
    }

    async fn query(&self, filter: &MigrationFilter) -> Result<Vec<Migration>, LedgerError> {
        let mut records: Vec<Migration> = self
            .load_all()?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn get(&self, uuid: Uuid) -> Result<Option<Migration>, LedgerError> {
        self.get_sync(uuid)
    }

    async fn delete(&self, uuid: Uuid) -> Result<(), LedgerError> {
        let key = uuid.to_string();
        let wtxn = self
            .db
            .begin_write()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        let removed = {
            let mut table = wtxn
                .open_table(MIGRATIONS)
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
            let removed_entry = table
                .remove(key.as_str())
                .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?
                .is_some();
            removed_entry
        };
        wtxn.commit()
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        if !removed {
            return Err(LedgerError::NotFound(key));
        }
        Ok(())
    }

    async fn archive(&self, uuid: Uuid) -> Result<(), LedgerError> {
        self.set_archived(uuid, true)
    }

    async fn unarchive(&self, uuid: Uuid) -> Result<(), LedgerError> {
        self.set_archived(uuid, false)
    }
}
