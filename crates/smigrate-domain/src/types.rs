use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Short string tag naming one kind of resource (e.g. `volume`, `network`,
/// `secret-container`). Registry keys and ledger rows use this tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(pub String);

impl ResourceType {
    pub fn new(s: impl Into<String>) -> Self {
        ResourceType(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        ResourceType(s.to_string())
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        ResourceType(s)
    }
}

// ── Dependency descriptors ───────────────────────────────────────────────────

/// A resource that must exist on the destination before the resource that
/// reported it can be created there.
///
/// Handlers return these from their association/member walks; the core
/// migrates them first and keeps the handler-provided order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub resource_type: ResourceType,
    pub source_id: String,
    /// Whether a cleanup-source pass may delete this dependency from the
    /// source cloud. Shared resources (flavors, networks) stay `false` so
    /// that migrating one dependent never cascades into removing a resource
    /// other dependents still use.
    #[serde(default)]
    pub should_cleanup: bool,
}

impl Dependency {
    pub fn new(resource_type: impl Into<ResourceType>, source_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            source_id: source_id.into(),
            should_cleanup: false,
        }
    }

    pub fn cleanup(mut self, should_cleanup: bool) -> Self {
        self.should_cleanup = should_cleanup;
        self
    }
}

/// A dependency that has already been migrated, carrying the id it received
/// on the destination cloud. Handlers look these up when rewriting foreign
/// references in the bodies they build for the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratedDependency {
    pub resource_type: ResourceType,
    pub source_id: String,
    pub destination_id: String,
}

impl MigratedDependency {
    pub fn new(
        resource_type: impl Into<ResourceType>,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            source_id: source_id.into(),
            destination_id: destination_id.into(),
        }
    }
}

// ── ID map ───────────────────────────────────────────────────────────────────

/// The `(type, source_id) → destination_id` mapping handed to a handler for
/// one migration step.
///
/// Entries keep insertion order so handlers observe dependencies in the same
/// order they reported them. A failed lookup is an error, never a sentinel:
/// it means the ledger recorded the dependency as migrated without a
/// destination id, which the orchestrator reports as an invariant violation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMap {
    entries: Vec<MigratedDependency>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<MigratedDependency>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: MigratedDependency) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MigratedDependency] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve the destination id recorded for `(resource_type, source_id)`.
    pub fn destination_id(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
    ) -> Result<&str, DomainError> {
        self.entries
            .iter()
            .find(|e| &e.resource_type == resource_type && e.source_id == source_id)
            .map(|e| e.destination_id.as_str())
            .ok_or_else(|| DomainError::MissingDependency {
                resource_type: resource_type.to_string(),
                source_id: source_id.to_string(),
            })
    }
}

impl<'a> IntoIterator for &'a IdMap {
    type Item = &'a MigratedDependency;
    type IntoIter = std::slice::Iter<'a, MigratedDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ── Migration options ────────────────────────────────────────────────────────

/// Per-invocation knobs for a migration request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateOptions {
    /// Delete the source copy after a successful migration.
    pub cleanup_source: bool,
    /// Recursively migrate associated (prerequisite) resources.
    pub include_dependencies: bool,
    /// Recursively migrate member (contained) resources.
    pub include_members: bool,
    /// Log the plan without touching the destination cloud or the ledger.
    pub dry_run: bool,
}

impl MigrateOptions {
    /// Options used when recursing into an associated resource: the cleanup
    /// flag is dropped because dependency cleanup is driven from the parent's
    /// remembered `should_cleanup` list, not by the recursive call.
    pub fn for_dependency(self) -> Self {
        Self {
            cleanup_source: false,
            ..self
        }
    }
}
