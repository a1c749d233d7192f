use serde::{Deserialize, Serialize};

/// Outcome summary of one batch migration run.
///
/// A batch keeps going past individual failures; the report carries what the
/// exit code alone cannot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub dry_run: bool,
    /// Source ids migrated (or walked, in dry-run mode) by this run.
    pub migrated: Vec<String>,
    /// Source ids skipped because a completed migration already exists.
    pub skipped: Vec<String>,
    /// Per-resource failures, as `"<source_id>: <error>"` strings.
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
