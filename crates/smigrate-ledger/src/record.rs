use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smigrate_domain::ResourceType;
use uuid::Uuid;

// ── Lifecycle state machine ───────────────────────────────────────────────────

/// The lifecycle state of one migration attempt.
///
/// Transitions:
///   InProgress → PendingMembers → PendingCleanup → Completed
///   InProgress → Failed
///   PendingCleanup → SourceCleanupFailed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    /// Record created, destination write not yet acknowledged.
    InProgress,
    /// Destination resource exists; member resources may still be pending.
    PendingMembers,
    /// Members done; the optional source-cleanup pass has not finished.
    PendingCleanup,
    /// Terminal success.
    Completed,
    /// Terminal failure during the parent migration; `error_message` is set.
    Failed,
    /// Destination write succeeded but deleting the source copy failed.
    /// The migration itself is not undone.
    SourceCleanupFailed,
}

impl MigrationStatus {
    /// Whether this state counts as "migrated" for dependency partitioning.
    /// `Failed` and `InProgress` do not.
    pub fn is_migrated(&self) -> bool {
        matches!(
            self,
            MigrationStatus::PendingMembers
                | MigrationStatus::PendingCleanup
                | MigrationStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Completed
                | MigrationStatus::Failed
                | MigrationStatus::SourceCleanupFailed
        )
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MigrationStatus::InProgress => "IN_PROGRESS",
            MigrationStatus::PendingMembers => "PENDING_MEMBERS",
            MigrationStatus::PendingCleanup => "PENDING_CLEANUP",
            MigrationStatus::Completed => "COMPLETED",
            MigrationStatus::Failed => "FAILED",
            MigrationStatus::SourceCleanupFailed => "SOURCE_CLEANUP_FAILED",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for MigrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Ok(MigrationStatus::InProgress),
            "PENDING_MEMBERS" => Ok(MigrationStatus::PendingMembers),
            "PENDING_CLEANUP" => Ok(MigrationStatus::PendingCleanup),
            "COMPLETED" => Ok(MigrationStatus::Completed),
            "FAILED" => Ok(MigrationStatus::Failed),
            "SOURCE_CLEANUP_FAILED" => Ok(MigrationStatus::SourceCleanupFailed),
            other => Err(format!("unknown migration status: {}", other)),
        }
    }
}

// Custom Deserialize that tolerates status strings written by older ledger
// revisions. Anything unrecognized is read back as `PendingMembers`: the
// intermediate state, so replays go through the idempotency gate instead of
// failing to parse the whole record.
impl<'de> Deserialize<'de> for MigrationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(s.parse().unwrap_or(MigrationStatus::PendingMembers))
    }
}

// ── Migration record ──────────────────────────────────────────────────────────

/// One ledger row: a single migration attempt for `(resource_type, source_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    /// Stable identifier, assigned by the ledger on first save.
    pub uuid: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    pub service: String,
    pub resource_type: ResourceType,
    pub source_cloud: String,
    pub destination_cloud: String,

    pub source_id: String,
    /// Set once the destination cloud has acknowledged creation.
    pub destination_id: Option<String>,

    pub status: MigrationStatus,
    pub error_message: Option<String>,

    /// Hidden from default queries; toggled by the delete/restore commands.
    #[serde(default)]
    pub archived: bool,
    /// Whether the source copy was removed after a successful migration.
    #[serde(default)]
    pub source_removed: bool,
    /// Whether the migration was performed outside this tool and registered
    /// via `register-external`.
    #[serde(default)]
    pub external: bool,
}

impl Migration {
    pub fn new(
        service: impl Into<String>,
        resource_type: ResourceType,
        source_cloud: impl Into<String>,
        destination_cloud: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            uuid: None,
            created_at: None,
            updated_at: None,
            service: service.into(),
            resource_type,
            source_cloud: source_cloud.into(),
            destination_cloud: destination_cloud.into(),
            source_id: source_id.into(),
            destination_id: None,
            status: MigrationStatus::InProgress,
            error_message: None,
            archived: false,
            source_removed: false,
            external: false,
        }
    }

    pub fn is_migrated(&self) -> bool {
        self.status.is_migrated()
    }
}

// ── Query filter ──────────────────────────────────────────────────────────────

/// Conjunctive query filter over ledger records.
///
/// Unset fields match everything. Archived rows are excluded unless
/// `include_archived` or `archived_only` asks for them.
#[derive(Debug, Clone, Default)]
pub struct MigrationFilter {
    pub uuid: Option<Uuid>,
    pub service: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub source_id: Option<String>,
    pub destination_id: Option<String>,
    pub status: Option<MigrationStatus>,
    pub external: Option<bool>,
    pub source_removed: Option<bool>,
    pub archived_only: bool,
    pub include_archived: bool,
}

impl MigrationFilter {
    pub fn by_resource(resource_type: &ResourceType, source_id: &str) -> Self {
        Self {
            resource_type: Some(resource_type.clone()),
            source_id: Some(source_id.to_string()),
            ..Self::default()
        }
    }

    pub fn by_uuid(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            include_archived: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, m: &Migration) -> bool {
        if self.archived_only {
            if !m.archived {
                return false;
            }
        } else if m.archived && !self.include_archived {
            return false;
        }
        if let Some(uuid) = self.uuid {
            if m.uuid != Some(uuid) {
                return false;
            }
        }
        if let Some(service) = &self.service {
            if &m.service != service {
                return false;
            }
        }
        if let Some(resource_type) = &self.resource_type {
            if &m.resource_type != resource_type {
                return false;
            }
        }
        if let Some(source_id) = &self.source_id {
            if &m.source_id != source_id {
                return false;
            }
        }
        if let Some(destination_id) = &self.destination_id {
            if m.destination_id.as_ref() != Some(destination_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if m.status != status {
                return false;
            }
        }
        if let Some(external) = self.external {
            if m.external != external {
                return false;
            }
        }
        if let Some(source_removed) = self.source_removed {
            if m.source_removed != source_removed {
                return false;
            }
        }
        true
    }
}

/// Sort records newest-first, the order every query returns.
pub(crate) fn sort_newest_first(records: &mut [Migration]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
