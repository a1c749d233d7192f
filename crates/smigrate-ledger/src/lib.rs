pub mod error;
pub mod ledger;
pub mod memory;
pub mod record;
pub mod redb_ledger;

pub use error::LedgerError;
pub use ledger::Ledger;
pub use memory::InMemoryLedger;
pub use record::{Migration, MigrationFilter, MigrationStatus};
pub use redb_ledger::RedbLedger;
