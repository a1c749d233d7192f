use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smigrate_config::MigrateConfig;
use smigrate_domain::{Dependency, IdMap, MigrateOptions, MigratedDependency, ResourceType};
use smigrate_handler::{HandlerError, HandlerRegistry, MigrationHandler, SubMigrate};
use smigrate_ledger::{InMemoryLedger, Ledger, MigrationFilter, MigrationStatus};

use crate::error::MigrateError;
use crate::orchestrator::Orchestrator;

type CallLog = Arc<Mutex<Vec<String>>>;

fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn calls_with_prefix(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

/// Scriptable in-memory handler used to drive the orchestrator through every
/// scenario without a remote API.
struct FakeHandler {
    service: &'static str,
    associated: HashMap<String, Vec<Dependency>>,
    members: HashMap<String, Vec<Dependency>>,
    fail_migrate: Mutex<HashSet<String>>,
    fail_delete: Mutex<HashSet<String>>,
    source_ids: Vec<String>,
    filters: Vec<String>,
    /// Auxiliary `(type, id)` this handler migrates through the core.
    submigrate: Option<(String, String)>,
    log: CallLog,
    received_deps: Mutex<HashMap<String, IdMap>>,
}

impl FakeHandler {
    fn new(service: &'static str, log: CallLog) -> Self {
        Self {
            service,
            associated: HashMap::new(),
            members: HashMap::new(),
            fail_migrate: Mutex::new(HashSet::new()),
            fail_delete: Mutex::new(HashSet::new()),
            source_ids: Vec::new(),
            filters: Vec::new(),
            submigrate: None,
            log,
            received_deps: Mutex::new(HashMap::new()),
        }
    }

    fn with_associated(mut self, source_id: &str, deps: Vec<Dependency>) -> Self {
        self.associated.insert(source_id.to_string(), deps);
        self
    }

    fn with_members(mut self, source_id: &str, members: Vec<Dependency>) -> Self {
        self.members.insert(source_id.to_string(), members);
        self
    }

    fn failing_migrate(self, source_id: &str) -> Self {
        self.fail_migrate.lock().unwrap().insert(source_id.to_string());
        self
    }

    fn failing_delete(self, source_id: &str) -> Self {
        self.fail_delete.lock().unwrap().insert(source_id.to_string());
        self
    }

    fn fix_delete(&self, source_id: &str) {
        self.fail_delete.lock().unwrap().remove(source_id);
    }

    fn fix_migrate(&self, source_id: &str) {
        self.fail_migrate.lock().unwrap().remove(source_id);
    }

    fn with_source_ids(mut self, ids: &[&str]) -> Self {
        self.source_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    fn with_submigrate(mut self, resource_type: &str, source_id: &str) -> Self {
        self.submigrate = Some((resource_type.to_string(), source_id.to_string()));
        self
    }

    fn deps_received_for(&self, source_id: &str) -> Option<IdMap> {
        self.received_deps.lock().unwrap().get(source_id).cloned()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl MigrationHandler for FakeHandler {
    fn service_tag(&self) -> &'static str {
        self.service
    }

    fn supported_filters(&self) -> Vec<String> {
        self.filters.clone()
    }

    async fn associated(&self, source_id: &str) -> Result<Vec<Dependency>, HandlerError> {
        Ok(self.associated.get(source_id).cloned().unwrap_or_default())
    }

    async fn members(&self, source_id: &str) -> Result<Vec<Dependency>, HandlerError> {
        Ok(self.members.get(source_id).cloned().unwrap_or_default())
    }

    async fn list_ids(
        &self,
        _filters: &HashMap<String, String>,
    ) -> Result<Vec<String>, HandlerError> {
        self.record("list_ids".to_string());
        Ok(self.source_ids.clone())
    }

    async fn migrate(
        &self,
        source_id: &str,
        deps: &IdMap,
        core: &dyn SubMigrate,
    ) -> Result<String, HandlerError> {
        self.record(format!("migrate {}", source_id));
        self.received_deps
            .lock()
            .unwrap()
            .insert(source_id.to_string(), deps.clone());

        if self.fail_migrate.lock().unwrap().contains(source_id) {
            return Err(HandlerError::Api("simulated migration failure".into()));
        }
        if let Some((aux_type, aux_id)) = &self.submigrate {
            core.migrate(
                &ResourceType::new(aux_type.clone()),
                aux_id,
                MigrateOptions::default(),
            )
            .await?;
        }
        Ok(format!("dst-{}", source_id))
    }

    async fn connect_members(
        &self,
        parent_destination_id: &str,
        members: &[MigratedDependency],
    ) -> Result<(), HandlerError> {
        let ids: Vec<&str> = members.iter().map(|m| m.source_id.as_str()).collect();
        self.record(format!(
            "connect_members {} [{}]",
            parent_destination_id,
            ids.join(",")
        ));
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), HandlerError> {
        self.record(format!("delete_source {}", source_id));
        if self.fail_delete.lock().unwrap().contains(source_id) {
            return Err(HandlerError::Api("simulated delete failure".into()));
        }
        Ok(())
    }
}

fn test_config() -> MigrateConfig {
    MigrateConfig {
        source_cloud_name: Some("src-cloud".into()),
        destination_cloud_name: Some("dst-cloud".into()),
        ..Default::default()
    }
}

fn build(
    handlers: &[(&str, Arc<FakeHandler>)],
) -> (Orchestrator, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let mut registry = HandlerRegistry::new();
    for (resource_type, handler) in handlers {
        registry.register(*resource_type, handler.clone() as Arc<dyn MigrationHandler>);
    }
    let orchestrator =
        Orchestrator::new(ledger.clone(), Arc::new(registry), &test_config()).unwrap();
    (orchestrator, ledger)
}

fn full_opts() -> MigrateOptions {
    MigrateOptions {
        include_dependencies: true,
        include_members: true,
        ..Default::default()
    }
}

async fn record_for(
    ledger: &InMemoryLedger,
    resource_type: &str,
    source_id: &str,
) -> Option<smigrate_ledger::Migration> {
    ledger
        .query(&MigrationFilter::by_resource(
            &ResourceType::new(resource_type),
            source_id,
        ))
        .await
        .unwrap()
        .into_iter()
        .next()
}

// ── Individual migration ──────────────────────────────────────────────────────

#[tokio::test]
async fn simple_migration_completes() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, ledger) = build(&[("widget", widget.clone())]);

    let migration = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(migration.status, MigrationStatus::Completed);
    assert_eq!(migration.destination_id.as_deref(), Some("dst-src-1"));
    assert_eq!(migration.service, "widgets");
    assert_eq!(migration.source_cloud, "src-cloud");
    assert!(migration.uuid.is_some());

    let all = ledger.query(&MigrationFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1, "exactly one active record for the pair");
    assert_eq!(calls_with_prefix(&log, "migrate").len(), 1);
}

#[tokio::test]
async fn dependencies_migrate_before_dependents() {
    let log = new_log();
    let a = Arc::new(FakeHandler::new("svc-a", log.clone()));
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b.clone())]);

    let migration = orchestrator
        .migrate(&ResourceType::new("b"), "b-1", full_opts())
        .await
        .unwrap();
    assert_eq!(migration.status, MigrationStatus::Completed);

    let dep = record_for(&ledger, "a", "a-1").await.unwrap();
    assert_eq!(dep.status, MigrationStatus::Completed);
    assert_eq!(dep.destination_id.as_deref(), Some("dst-a-1"));

    // The dependency's migrate call happens strictly before the dependent's.
    let migrate_calls = calls_with_prefix(&log, "migrate");
    assert_eq!(migrate_calls, vec!["migrate a-1", "migrate b-1"]);

    // The dependent's handler saw the mapped destination id.
    let deps = b.deps_received_for("b-1").unwrap();
    assert_eq!(
        deps.destination_id(&ResourceType::new("a"), "a-1").unwrap(),
        "dst-a-1"
    );
}

#[tokio::test]
async fn repeated_migration_is_idempotent() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, ledger) = build(&[("widget", widget)]);

    let first = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();
    let second = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(first.uuid, second.uuid);
    assert_eq!(calls_with_prefix(&log, "migrate").len(), 1);
    let all = ledger.query(&MigrationFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn retry_after_failure_reuses_the_record() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()).failing_migrate("src-1"));
    let (orchestrator, ledger) = build(&[("widget", widget.clone())]);

    let err = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::HandlerFailure(_)));

    let failed = record_for(&ledger, "widget", "src-1").await.unwrap();
    assert_eq!(failed.status, MigrationStatus::Failed);

    widget.fix_migrate("src-1");
    let retried = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(retried.status, MigrationStatus::Completed);
    assert_eq!(retried.uuid, failed.uuid, "retry reuses the prior record");
    assert!(retried.error_message.is_none());

    let all = ledger.query(&MigrationFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1, "a retry must not leave a second active row");
}

#[tokio::test]
async fn failed_dependency_fails_dependent() {
    let log = new_log();
    let a = Arc::new(FakeHandler::new("svc-a", log.clone()).failing_migrate("a-1"));
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b)]);

    let err = orchestrator
        .migrate(&ResourceType::new("b"), "b-1", full_opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::DependenciesPending { .. }));

    let dep = record_for(&ledger, "a", "a-1").await.unwrap();
    assert_eq!(dep.status, MigrationStatus::Failed);
    assert!(dep.error_message.unwrap().contains("simulated migration failure"));

    let parent = record_for(&ledger, "b", "b-1").await.unwrap();
    assert_eq!(parent.status, MigrationStatus::Failed);
    assert!(parent.error_message.unwrap().contains("pending"));

    // The dependent's destination write never ran.
    assert_eq!(calls_with_prefix(&log, "migrate b-1").len(), 0);
}

#[tokio::test]
async fn pending_dependencies_require_opt_in() {
    let log = new_log();
    let a = Arc::new(FakeHandler::new("svc-a", log.clone()));
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b)]);

    let err = orchestrator
        .migrate(&ResourceType::new("b"), "b-1", MigrateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::DependenciesPending { .. }));

    let parent = record_for(&ledger, "b", "b-1").await.unwrap();
    assert_eq!(parent.status, MigrationStatus::Failed);
    // The dependency was never attempted.
    assert!(record_for(&ledger, "a", "a-1").await.is_none());
}

// ── Cleanup semantics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn cleanup_spares_shared_dependencies() {
    let log = new_log();
    let c = Arc::new(FakeHandler::new("svc-c", log.clone()).with_associated(
        "c-1",
        vec![
            Dependency::new("d", "d-1").cleanup(true),
            Dependency::new("e", "e-1").cleanup(false),
        ],
    ));
    let d = Arc::new(FakeHandler::new("svc-d", log.clone()));
    let e = Arc::new(FakeHandler::new("svc-e", log.clone()));
    let (orchestrator, ledger) = build(&[("c", c), ("d", d), ("e", e)]);

    orchestrator
        .migrate(
            &ResourceType::new("c"),
            "c-1",
            MigrateOptions {
                cleanup_source: true,
                include_dependencies: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(calls_with_prefix(&log, "delete_source c-1").len(), 1);
    assert_eq!(calls_with_prefix(&log, "delete_source d-1").len(), 1);
    assert_eq!(calls_with_prefix(&log, "delete_source e-1").len(), 0);

    assert!(record_for(&ledger, "c", "c-1").await.unwrap().source_removed);
    assert!(record_for(&ledger, "d", "d-1").await.unwrap().source_removed);
    assert!(!record_for(&ledger, "e", "e-1").await.unwrap().source_removed);
}

#[tokio::test]
async fn failed_source_cleanup_keeps_destination() {
    let log = new_log();
    let widget =
        Arc::new(FakeHandler::new("widgets", log.clone()).failing_delete("src-1"));
    let (orchestrator, ledger) = build(&[("widget", widget.clone())]);

    let err = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions {
                cleanup_source: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::SourceCleanupFailed(_)));

    let record = record_for(&ledger, "widget", "src-1").await.unwrap();
    assert_eq!(record.status, MigrationStatus::SourceCleanupFailed);
    // The destination write is not undone.
    assert_eq!(record.destination_id.as_deref(), Some("dst-src-1"));
    assert!(!record.source_removed);

    // Once the failure cause is gone, the retry command finishes the job.
    widget.fix_delete("src-1");
    let record = orchestrator
        .retry_cleanup(&ResourceType::new("widget"), "src-1")
        .await
        .unwrap();
    assert_eq!(record.status, MigrationStatus::Completed);
    assert!(record.source_removed);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn retry_cleanup_without_migration_is_not_found() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, _ledger) = build(&[("widget", widget)]);

    let err = orchestrator
        .retry_cleanup(&ResourceType::new("widget"), "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::NotFound(_)));
}

// ── Member phase ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn member_failure_is_best_effort() {
    let log = new_log();
    let parent = Arc::new(FakeHandler::new("svc-p", log.clone()).with_members(
        "p-1",
        vec![Dependency::new("m", "m-1"), Dependency::new("m", "m-2")],
    ));
    let member = Arc::new(FakeHandler::new("svc-m", log.clone()).failing_migrate("m-1"));
    let (orchestrator, ledger) = build(&[("p", parent), ("m", member)]);

    let migration = orchestrator
        .migrate(&ResourceType::new("p"), "p-1", full_opts())
        .await
        .unwrap();
    assert_eq!(migration.status, MigrationStatus::Completed);

    assert_eq!(
        record_for(&ledger, "m", "m-1").await.unwrap().status,
        MigrationStatus::Failed
    );
    assert_eq!(
        record_for(&ledger, "m", "m-2").await.unwrap().status,
        MigrationStatus::Completed
    );

    // Only the member that made it is connected to the parent.
    assert_eq!(
        calls_with_prefix(&log, "connect_members"),
        vec!["connect_members dst-p-1 [m-2]"]
    );
}

#[tokio::test]
async fn member_already_migrated_is_not_reconnected() {
    let log = new_log();
    // The same resource is both a prerequisite and a member; after the
    // dependency pass it is already migrated, so the member phase skips it.
    let parent = Arc::new(
        FakeHandler::new("svc-p", log.clone())
            .with_associated("p-1", vec![Dependency::new("m", "m-1")])
            .with_members("p-1", vec![Dependency::new("m", "m-1")]),
    );
    let member = Arc::new(FakeHandler::new("svc-m", log.clone()));
    let (orchestrator, _ledger) = build(&[("p", parent), ("m", member)]);

    orchestrator
        .migrate(&ResourceType::new("p"), "p-1", full_opts())
        .await
        .unwrap();

    assert_eq!(calls_with_prefix(&log, "migrate m-1").len(), 1);
    assert_eq!(
        calls_with_prefix(&log, "connect_members"),
        vec!["connect_members dst-p-1 []"]
    );
}

// ── Cycles and concurrent runs ────────────────────────────────────────────────

#[tokio::test]
async fn dependency_cycle_terminates() {
    let log = new_log();
    let a = Arc::new(
        FakeHandler::new("svc-a", log.clone())
            .with_associated("a-1", vec![Dependency::new("b", "b-1")]),
    );
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b)]);

    let err = orchestrator
        .migrate(&ResourceType::new("a"), "a-1", full_opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::DependenciesPending { .. }));

    // The inner resource hit the invariant check after the cycle was skipped.
    let inner = record_for(&ledger, "b", "b-1").await.unwrap();
    assert_eq!(inner.status, MigrationStatus::Failed);
    assert!(inner.error_message.unwrap().contains("invariant violation"));

    let outer = record_for(&ledger, "a", "a-1").await.unwrap();
    assert_eq!(outer.status, MigrationStatus::Failed);

    // Neither destination write ran.
    assert!(calls_with_prefix(&log, "migrate").is_empty());
}

#[tokio::test]
async fn foreign_in_progress_dependency_is_surfaced() {
    let log = new_log();
    let a = Arc::new(FakeHandler::new("svc-a", log.clone()));
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b)]);

    // Simulate a crashed or concurrent run that left a-1 IN_PROGRESS.
    let mut stale = smigrate_ledger::Migration::new(
        "svc-a",
        ResourceType::new("a"),
        "src-cloud",
        "dst-cloud",
        "a-1",
    );
    ledger.save(&mut stale).await.unwrap();

    let err = orchestrator
        .migrate(&ResourceType::new("b"), "b-1", full_opts())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::ConcurrentOrStuck { .. }));

    let parent = record_for(&ledger, "b", "b-1").await.unwrap();
    assert_eq!(parent.status, MigrationStatus::Failed);
}

// ── Handler re-entry ──────────────────────────────────────────────────────────

#[tokio::test]
async fn auxiliary_migrations_go_through_the_gate() {
    let log = new_log();
    let volume = Arc::new(
        FakeHandler::new("block-storage", log.clone()).with_submigrate("image", "img-1"),
    );
    let image = Arc::new(FakeHandler::new("image", log.clone()));
    let (orchestrator, ledger) = build(&[("volume", volume), ("image", image)]);

    orchestrator
        .migrate(
            &ResourceType::new("volume"),
            "vol-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    let aux = record_for(&ledger, "image", "img-1").await.unwrap();
    assert_eq!(aux.status, MigrationStatus::Completed);
    assert_eq!(
        record_for(&ledger, "volume", "vol-1").await.unwrap().status,
        MigrationStatus::Completed
    );

    // A second volume migration is gated; the auxiliary image is not
    // re-created either.
    orchestrator
        .migrate(
            &ResourceType::new("volume"),
            "vol-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(calls_with_prefix(&log, "migrate img-1").len(), 1);
    assert_eq!(calls_with_prefix(&log, "migrate vol-1").len(), 1);
}

// ── Dry run ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_mutates_nothing() {
    let log = new_log();
    let a = Arc::new(FakeHandler::new("svc-a", log.clone()));
    let b = Arc::new(
        FakeHandler::new("svc-b", log.clone())
            .with_associated("b-1", vec![Dependency::new("a", "a-1")])
            .with_members("b-1", vec![Dependency::new("a", "a-2")]),
    );
    let (orchestrator, ledger) = build(&[("a", a), ("b", b)]);

    orchestrator
        .migrate(
            &ResourceType::new("b"),
            "b-1",
            MigrateOptions {
                dry_run: true,
                cleanup_source: true,
                include_dependencies: true,
                include_members: true,
            },
        )
        .await
        .unwrap();

    let all = ledger
        .query(&MigrationFilter {
            include_archived: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(all.is_empty(), "dry run must not write to the ledger");
    assert!(calls_with_prefix(&log, "migrate").is_empty());
    assert!(calls_with_prefix(&log, "delete_source").is_empty());
    assert!(calls_with_prefix(&log, "connect_members").is_empty());
}

#[tokio::test]
async fn dry_run_consults_the_gate() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, _ledger) = build(&[("widget", widget)]);

    let real = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    let dry = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // The already-migrated record is returned instead of a fresh plan.
    assert_eq!(dry.uuid, real.uuid);
    assert_eq!(calls_with_prefix(&log, "migrate").len(), 1);
}

// ── Batch migration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_batch_completes_without_writes() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, ledger) = build(&[("widget", widget)]);

    let report = orchestrator
        .migrate_batch(
            &ResourceType::new("widget"),
            &HashMap::new(),
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    assert!(report.migrated.is_empty());
    assert!(report.skipped.is_empty());
    assert!(!report.has_errors());
    assert!(ledger.query(&MigrationFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_skips_completed_and_continues_past_failures() {
    let log = new_log();
    let widget = Arc::new(
        FakeHandler::new("widgets", log.clone())
            .with_source_ids(&["w-1", "w-2", "w-3"])
            .failing_migrate("w-2"),
    );
    let (orchestrator, ledger) = build(&[("widget", widget)]);

    // w-1 is already migrated.
    orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "w-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    let report = orchestrator
        .migrate_batch(
            &ResourceType::new("widget"),
            &HashMap::new(),
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.skipped, vec!["w-1"]);
    assert_eq!(report.migrated, vec!["w-3"]);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("w-2:"));

    assert_eq!(
        record_for(&ledger, "widget", "w-2").await.unwrap().status,
        MigrationStatus::Failed
    );
    assert_eq!(
        record_for(&ledger, "widget", "w-3").await.unwrap().status,
        MigrationStatus::Completed
    );
}

#[tokio::test]
async fn batch_rejects_unknown_filters() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, _ledger) = build(&[("widget", widget)]);

    let mut filters = HashMap::new();
    filters.insert("bogus".to_string(), "x".to_string());
    let err = orchestrator
        .migrate_batch(
            &ResourceType::new("widget"),
            &filters,
            MigrateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::InvalidFilter(_)));
    assert!(calls_with_prefix(&log, "list_ids").is_empty());
}

// ── External migrations and archiving ────────────────────────────────────────

#[tokio::test]
async fn register_external_then_migrate_is_a_noop() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, _ledger) = build(&[("widget", widget)]);

    let registered = orchestrator
        .register_external(&ResourceType::new("widget"), "src-1", "manual-dst")
        .await
        .unwrap();
    assert!(registered.external);
    assert_eq!(registered.status, MigrationStatus::Completed);

    let migrated = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(migrated.uuid, registered.uuid);
    assert_eq!(migrated.destination_id.as_deref(), Some("manual-dst"));
    assert!(calls_with_prefix(&log, "migrate").is_empty());
}

#[tokio::test]
async fn register_external_twice_returns_existing() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, ledger) = build(&[("widget", widget)]);

    let first = orchestrator
        .register_external(&ResourceType::new("widget"), "src-1", "manual-dst")
        .await
        .unwrap();
    let second = orchestrator
        .register_external(&ResourceType::new("widget"), "src-1", "manual-dst")
        .await
        .unwrap();

    assert_eq!(first.uuid, second.uuid);
    assert_eq!(ledger.query(&MigrationFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn archiving_reopens_the_gate() {
    let log = new_log();
    let widget = Arc::new(FakeHandler::new("widgets", log.clone()));
    let (orchestrator, ledger) = build(&[("widget", widget)]);

    let first = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();

    ledger.archive(first.uuid.unwrap()).await.unwrap();

    let second = orchestrator
        .migrate(
            &ResourceType::new("widget"),
            "src-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap();
    assert_ne!(first.uuid, second.uuid);
    assert_eq!(calls_with_prefix(&log, "migrate").len(), 2);

    let active = ledger.query(&MigrationFilter::default()).await.unwrap();
    assert_eq!(active.len(), 1);
    let all = ledger
        .query(&MigrationFilter {
            include_archived: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

// ── Error surface ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn timeout_during_handler_wait_fails_the_record() {
    struct TimeoutHandler;

    #[async_trait]
    impl MigrationHandler for TimeoutHandler {
        fn service_tag(&self) -> &'static str {
            "block-storage"
        }

        async fn list_ids(
            &self,
            _filters: &HashMap<String, String>,
        ) -> Result<Vec<String>, HandlerError> {
            Ok(vec![])
        }

        async fn migrate(
            &self,
            _source_id: &str,
            _deps: &IdMap,
            _core: &dyn SubMigrate,
        ) -> Result<String, HandlerError> {
            Err(HandlerError::Timeout(std::time::Duration::from_secs(600)))
        }

        async fn delete_source(&self, _source_id: &str) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    let ledger = Arc::new(InMemoryLedger::new());
    let mut registry = HandlerRegistry::new();
    registry.register("volume", Arc::new(TimeoutHandler) as Arc<dyn MigrationHandler>);
    let orchestrator =
        Orchestrator::new(ledger.clone(), Arc::new(registry), &test_config()).unwrap();

    let err = orchestrator
        .migrate(
            &ResourceType::new("volume"),
            "vol-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::HandlerFailure(_)));

    let record = record_for(&ledger, "volume", "vol-1").await.unwrap();
    assert_eq!(record.status, MigrationStatus::Failed);
    assert!(record.destination_id.is_none());
}

#[tokio::test]
async fn unknown_resource_type_is_surfaced() {
    let (orchestrator, _ledger) = build(&[]);
    let err = orchestrator
        .migrate(
            &ResourceType::new("no-such-type"),
            "id-1",
            MigrateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::UnsupportedType(_)));
}

#[tokio::test]
async fn orchestrator_requires_cloud_names() {
    let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
    let registry = Arc::new(HandlerRegistry::new());
    let err = Orchestrator::new(ledger, registry, &MigrateConfig::default()).unwrap_err();
    assert!(matches!(err, MigrateError::InvalidInput(_)));
}
