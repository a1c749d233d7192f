use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smigrate_config::MigrateConfig;
use smigrate_domain::{MigrateOptions, MigratedDependency, ResourceType};
use smigrate_handler::{
    validate_filters, HandlerError, HandlerRegistry, MigrationHandler, SubMigrate,
};
use smigrate_ledger::{Ledger, Migration, MigrationFilter, MigrationStatus};
use tracing::{debug, error, info, warn};

use crate::error::MigrateError;
use crate::project::{project_id_map, to_migrated_dependency};
use crate::report::BatchReport;
use crate::resolver::partition_dependencies;

type ResourceKey = (ResourceType, String);
type MigrateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Migration, MigrateError>> + Send + 'a>>;

/// Top-level migration driver.
///
/// Walks the associated/member graph depth-first, one resource at a time,
/// and is the only writer of ledger state. Handlers never touch the ledger;
/// they reach back into the orchestrator only through the [`SubMigrate`]
/// capability, which re-enters the same idempotency gate.
pub struct Orchestrator {
    ledger: Arc<dyn Ledger>,
    registry: Arc<HandlerRegistry>,
    source_cloud: String,
    destination_cloud: String,
    /// `(type, id)` pairs on the current recursion stack. An `IN_PROGRESS`
    /// ledger record for a pair in this list belongs to this very run (the
    /// walk re-entered its own ancestor); one for a pair outside it belongs
    /// to another invocation or a crashed run.
    in_flight: Mutex<Vec<ResourceKey>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("source_cloud", &self.source_cloud)
            .field("destination_cloud", &self.destination_cloud)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        registry: Arc<HandlerRegistry>,
        config: &MigrateConfig,
    ) -> Result<Self, MigrateError> {
        let source_cloud = config
            .source_cloud_name
            .clone()
            .ok_or_else(|| MigrateError::InvalidInput("no source cloud specified".into()))?;
        let destination_cloud = config
            .destination_cloud_name
            .clone()
            .ok_or_else(|| MigrateError::InvalidInput("no destination cloud specified".into()))?;

        Ok(Self {
            ledger,
            registry,
            source_cloud,
            destination_cloud,
            in_flight: Mutex::new(Vec::new()),
        })
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    // ── Individual migration ──────────────────────────────────────────────────

    /// Migrate one resource, optionally recursing into its associated and
    /// member resources.
    pub async fn migrate(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<Migration, MigrateError> {
        if source_id.is_empty() {
            return Err(MigrateError::InvalidInput("no resource id specified".into()));
        }
        if options.dry_run {
            return self
                .dry_run_boxed(resource_type.clone(), source_id.to_string(), options)
                .await;
        }
        self.migrate_boxed(resource_type.clone(), source_id.to_string(), options)
            .await
    }

    // The traversal is recursive and async; boxing breaks the infinitely
    // sized future type.
    fn migrate_boxed<'a>(
        &'a self,
        resource_type: ResourceType,
        source_id: String,
        options: MigrateOptions,
    ) -> MigrateFuture<'a> {
        Box::pin(async move { self.migrate_one(resource_type, source_id, options).await })
    }

    async fn migrate_one(
        &self,
        resource_type: ResourceType,
        source_id: String,
        options: MigrateOptions,
    ) -> Result<Migration, MigrateError> {
        let handler = self.registry.get(&resource_type)?;

        // Idempotency gate: an existing record in a migrated status wins and
        // the destination is not touched again.
        let prior = self
            .ledger
            .query(&MigrationFilter::by_resource(&resource_type, &source_id))
            .await?
            .into_iter()
            .next();
        if let Some(first) = &prior {
            if first.is_migrated() {
                info!(
                    "Already migrated {} resource: {} (migration {}, status {}), \
                     skipping duplicate migration",
                    resource_type,
                    source_id,
                    uuid_str(first),
                    first.status,
                );
                return Ok(first.clone());
            }
        }

        info!(
            "Initiating {} migration, resource id: {}",
            resource_type, source_id
        );

        // The record must exist before any destination write so a crash in
        // between is observable as IN_PROGRESS on restart. A prior FAILED or
        // IN_PROGRESS attempt is reused so each pair keeps a single active
        // row; a SOURCE_CLEANUP_FAILED record is terminal and stays behind
        // for post-mortem.
        let mut record = match prior {
            Some(mut attempt)
                if matches!(
                    attempt.status,
                    MigrationStatus::InProgress | MigrationStatus::Failed
                ) =>
            {
                info!(
                    "Retrying migration {} for {} {}",
                    uuid_str(&attempt),
                    resource_type,
                    source_id
                );
                attempt.service = handler.service_tag().to_string();
                attempt.status = MigrationStatus::InProgress;
                attempt.destination_id = None;
                attempt.error_message = None;
                attempt
            }
            _ => Migration::new(
                handler.service_tag(),
                resource_type.clone(),
                &self.source_cloud,
                &self.destination_cloud,
                &source_id,
            ),
        };
        self.ledger.save(&mut record).await?;

        self.push_in_flight(&resource_type, &source_id);
        let result = self
            .run_phases(handler.as_ref(), &mut record, &resource_type, &source_id, options)
            .await;
        self.pop_in_flight(&resource_type, &source_id);

        result.map(|()| record)
    }

    /// Drive one record through the state machine:
    /// IN_PROGRESS → PENDING_MEMBERS → PENDING_CLEANUP → COMPLETED.
    async fn run_phases(
        &self,
        handler: &dyn MigrationHandler,
        record: &mut Migration,
        resource_type: &ResourceType,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<(), MigrateError> {
        let (destination_id, cleanup_migrations) = match self
            .migrate_parent(handler, resource_type, source_id, options)
            .await
        {
            Ok(parent) => parent,
            Err(err) => {
                record.status = MigrationStatus::Failed;
                record.error_message = Some(format!("Migration failed, error: {}", err));
                self.ledger.save(record).await?;
                return Err(err);
            }
        };

        record.destination_id = Some(destination_id.clone());
        record.status = MigrationStatus::PendingMembers;
        self.ledger.save(record).await?;

        if options.include_members {
            let migrated_members = self.migrate_members(handler, source_id, options).await?;
            if let Err(err) = handler
                .connect_members(&destination_id, &migrated_members)
                .await
            {
                error!(
                    "Failed to connect member resources to parent {}: {}",
                    source_id, err
                );
            }
        }

        record.status = MigrationStatus::PendingCleanup;
        self.ledger.save(record).await?;

        if options.cleanup_source {
            self.cleanup_migration_source(record).await?;
            for mut associated in cleanup_migrations {
                self.cleanup_migration_source(&mut associated).await?;
            }
        }

        record.status = MigrationStatus::Completed;
        self.ledger.save(record).await?;
        Ok(())
    }

    /// The parent phase: migrate pending dependencies, rebuild the id map and
    /// run the handler's create-on-destination step.
    ///
    /// Returns the destination id and the dependency migrations remembered
    /// for the cleanup pass (`should_cleanup=true` ones only).
    async fn migrate_parent(
        &self,
        handler: &dyn MigrationHandler,
        resource_type: &ResourceType,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<(String, Vec<Migration>), MigrateError> {
        let mut deps = partition_dependencies(self.ledger.as_ref(), handler, source_id).await?;
        debug!(
            "Associated resources of {} {} - migrated: {:?}, pending: {:?}",
            resource_type,
            source_id,
            deps.migrated.len(),
            deps.pending_summary(),
        );

        let mut cleanup_migrations = Vec::new();

        if !deps.pending.is_empty() {
            if !options.include_dependencies {
                return Err(MigrateError::DependenciesPending {
                    resource_type: resource_type.to_string(),
                    source_id: source_id.to_string(),
                    pending: deps.pending_summary(),
                });
            }

            let mut dependency_failed = false;
            for dependency in &deps.pending {
                // Re-check the ledger: an earlier iteration (or a shared
                // transitive dependency) may have satisfied this pair already.
                let existing = self
                    .ledger
                    .query(&MigrationFilter::by_resource(
                        &dependency.resource_type,
                        &dependency.source_id,
                    ))
                    .await?;
                if let Some(first) = existing.into_iter().next() {
                    if first.is_migrated() {
                        info!(
                            "Associated resource {} {} already completed (migration {}, \
                             status {}), skipping duplicate migration",
                            dependency.resource_type,
                            dependency.source_id,
                            uuid_str(&first),
                            first.status,
                        );
                        continue;
                    }
                    if first.status == MigrationStatus::InProgress {
                        if self.is_in_flight(&dependency.resource_type, &dependency.source_id) {
                            info!(
                                "Associated resource {} {} already in progress \
                                 (migration {}), will be available once the current \
                                 run completes",
                                dependency.resource_type,
                                dependency.source_id,
                                uuid_str(&first),
                            );
                            continue;
                        }
                        return Err(MigrateError::ConcurrentOrStuck {
                            resource_type: dependency.resource_type.to_string(),
                            source_id: dependency.source_id.clone(),
                            uuid: uuid_str(&first),
                        });
                    }
                    // FAILED records fall through and are retried.
                }

                info!(
                    "Migrating associated {} resource: {}",
                    dependency.resource_type, dependency.source_id
                );
                match self
                    .migrate_boxed(
                        dependency.resource_type.clone(),
                        dependency.source_id.clone(),
                        options.for_dependency(),
                    )
                    .await
                {
                    Ok(migration) => {
                        if dependency.should_cleanup && options.cleanup_source {
                            debug!(
                                "Adding associated resource to the cleanup list: {} {}",
                                dependency.resource_type, dependency.source_id
                            );
                            cleanup_migrations.push(migration);
                        } else if options.cleanup_source {
                            debug!(
                                "Associated resource {} {} is shared, leaving the \
                                 source copy in place",
                                dependency.resource_type, dependency.source_id
                            );
                        }
                    }
                    Err(err) => {
                        error!(
                            "Failed to migrate associated {} resource {}: {}",
                            dependency.resource_type, dependency.source_id, err
                        );
                        dependency_failed = true;
                    }
                }
            }

            // Refresh the partition: everything must have landed in a
            // migrated status by now.
            deps = partition_dependencies(self.ledger.as_ref(), handler, source_id).await?;
            if !deps.pending.is_empty() {
                let pending = deps.pending_summary();
                if dependency_failed {
                    return Err(MigrateError::DependenciesPending {
                        resource_type: resource_type.to_string(),
                        source_id: source_id.to_string(),
                        pending,
                    });
                }
                // No recursion reported a failure, yet dependencies are still
                // pending: a cycle or a ledger/resolver disagreement.
                return Err(MigrateError::InvariantViolation(format!(
                    "unable to migrate {} resource ({}), dependencies still \
                     pending after recursion: {:?}",
                    resource_type, source_id, pending
                )));
            }
        }

        // The handler is expected to clean up failed attempts on the
        // destination side before returning the error.
        let id_map = project_id_map(&deps.migrated)?;
        let destination_id = handler.migrate(source_id, &id_map, self).await?;

        info!(
            "Successfully migrated {} resource, destination id: {}",
            resource_type, destination_id
        );
        Ok((destination_id, cleanup_migrations))
    }

    /// Best-effort member phase: one member failing does not fail the parent
    /// or the remaining members. Returns the members that made it, in order,
    /// for `connect_members`.
    async fn migrate_members(
        &self,
        handler: &dyn MigrationHandler,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<Vec<MigratedDependency>, MigrateError> {
        let members = match handler.members(source_id).await {
            Ok(members) => members,
            Err(err) => {
                error!(
                    "Failed to enumerate member resources of {}: {}",
                    source_id, err
                );
                return Ok(vec![]);
            }
        };

        let mut migrated_members = Vec::new();
        for member in members {
            let existing = self
                .ledger
                .query(&MigrationFilter::by_resource(
                    &member.resource_type,
                    &member.source_id,
                ))
                .await?;
            if let Some(first) = existing.into_iter().next() {
                if first.is_migrated() {
                    info!(
                        "Member resource {} {} already completed (migration {} - {}), \
                         skipping duplicate migration",
                        member.resource_type,
                        member.source_id,
                        uuid_str(&first),
                        first.status,
                    );
                    continue;
                }
                if first.status == MigrationStatus::InProgress {
                    info!(
                        "Member resource {} {} already in progress (migration {}), \
                         skipping duplicate migration",
                        member.resource_type,
                        member.source_id,
                        uuid_str(&first),
                    );
                    continue;
                }
                // FAILED members are retried.
            }

            info!(
                "Migrating member {} resource: {}",
                member.resource_type, member.source_id
            );
            match self
                .migrate_boxed(
                    member.resource_type.clone(),
                    member.source_id.clone(),
                    options,
                )
                .await
            {
                Ok(migration) => match to_migrated_dependency(&migration) {
                    Ok(migrated) => migrated_members.push(migrated),
                    Err(err) => error!(
                        "Migrated member {} {} has no usable destination id: {}",
                        member.resource_type, member.source_id, err
                    ),
                },
                Err(err) => {
                    error!(
                        "Failed to migrate member resource {} {}: {}",
                        member.resource_type, member.source_id, err
                    );
                }
            }
        }
        Ok(migrated_members)
    }

    // ── Batch migration ───────────────────────────────────────────────────────

    /// Migrate every source resource matching the filters. Individual
    /// failures are reported, not fatal.
    pub async fn migrate_batch(
        &self,
        resource_type: &ResourceType,
        filters: &HashMap<String, String>,
        options: MigrateOptions,
    ) -> Result<BatchReport, MigrateError> {
        let handler = self.registry.get(resource_type)?;
        validate_filters(handler.as_ref(), filters)?;

        let source_ids = handler.list_ids(filters).await?;
        let mut report = BatchReport::new(options.dry_run);

        for source_id in source_ids {
            let completed = self
                .ledger
                .query(&MigrationFilter {
                    resource_type: Some(resource_type.clone()),
                    source_id: Some(source_id.clone()),
                    status: Some(MigrationStatus::Completed),
                    ..Default::default()
                })
                .await?;
            if let Some(first) = completed.first() {
                info!(
                    "Resource already migrated, skipping: {}. Migration: {}.",
                    source_id,
                    uuid_str(first),
                );
                report.skipped.push(source_id);
                continue;
            }

            match self.migrate(resource_type, &source_id, options).await {
                Ok(_) => report.migrated.push(source_id),
                Err(err) => {
                    error!(
                        "Failed to migrate {} resource {}: {}",
                        resource_type, source_id, err
                    );
                    report.errors.push(format!("{}: {}", source_id, err));
                }
            }
        }
        Ok(report)
    }

    // ── Source cleanup ────────────────────────────────────────────────────────

    /// Delete the source copy recorded in `migration`.
    async fn cleanup_migration_source(
        &self,
        migration: &mut Migration,
    ) -> Result<(), MigrateError> {
        info!(
            "Migration succeeded, cleaning up source {}: {}",
            migration.resource_type, migration.source_id
        );
        if migration.source_id.is_empty() {
            return Err(MigrateError::InvalidInput("missing source id".into()));
        }

        let handler = self.registry.get(&migration.resource_type)?;
        match handler.delete_source(&migration.source_id).await {
            Ok(()) => {
                migration.source_removed = true;
                self.ledger.save(migration).await?;
                Ok(())
            }
            Err(err) => {
                migration.status = MigrationStatus::SourceCleanupFailed;
                migration.error_message =
                    Some(format!("Source cleanup failed, error: {}", err));
                self.ledger.save(migration).await?;
                Err(MigrateError::SourceCleanupFailed(err.to_string()))
            }
        }
    }

    /// Retry the source-cleanup pass for a previously migrated resource.
    pub async fn retry_cleanup(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
    ) -> Result<Migration, MigrateError> {
        let records = self
            .ledger
            .query(&MigrationFilter::by_resource(resource_type, source_id))
            .await?;
        let mut record = records.into_iter().next().ok_or_else(|| {
            MigrateError::NotFound(format!(
                "no migration on file for {} {}",
                resource_type, source_id
            ))
        })?;

        if record.source_removed {
            info!(
                "Source already removed for {} {} (migration {})",
                resource_type,
                source_id,
                uuid_str(&record),
            );
            return Ok(record);
        }
        if record.destination_id.is_none() {
            return Err(MigrateError::InvalidInput(format!(
                "migration {} has no destination id; only successful migrations \
                 can have their source cleaned up",
                uuid_str(&record),
            )));
        }

        self.cleanup_migration_source(&mut record).await?;

        if matches!(
            record.status,
            MigrationStatus::SourceCleanupFailed | MigrationStatus::PendingCleanup
        ) {
            record.status = MigrationStatus::Completed;
            record.error_message = None;
            self.ledger.save(&mut record).await?;
        }
        Ok(record)
    }

    // ── External migrations ───────────────────────────────────────────────────

    /// Record a migration performed outside this tool, so the pair passes the
    /// idempotency gate and dependents resolve against the given destination.
    pub async fn register_external(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
        destination_id: &str,
    ) -> Result<Migration, MigrateError> {
        if source_id.is_empty() {
            return Err(MigrateError::InvalidInput("unspecified source resource id".into()));
        }
        if destination_id.is_empty() {
            return Err(MigrateError::InvalidInput(
                "unspecified destination resource id".into(),
            ));
        }
        let handler = self.registry.get(resource_type)?;

        let existing = self
            .ledger
            .query(&MigrationFilter {
                resource_type: Some(resource_type.clone()),
                source_id: Some(source_id.to_string()),
                destination_id: Some(destination_id.to_string()),
                status: Some(MigrationStatus::Completed),
                ..Default::default()
            })
            .await?;
        if let Some(first) = existing.into_iter().next() {
            warn!(
                "Found existing migration: {}, skipping...",
                uuid_str(&first)
            );
            return Ok(first);
        }

        let mut record = Migration::new(
            handler.service_tag(),
            resource_type.clone(),
            &self.source_cloud,
            &self.destination_cloud,
            source_id,
        );
        record.destination_id = Some(destination_id.to_string());
        record.status = MigrationStatus::Completed;
        record.external = true;
        self.ledger.save(&mut record).await?;
        Ok(record)
    }

    // ── Dry run ───────────────────────────────────────────────────────────────

    fn dry_run_boxed<'a>(
        &'a self,
        resource_type: ResourceType,
        source_id: String,
        options: MigrateOptions,
    ) -> MigrateFuture<'a> {
        Box::pin(async move { self.dry_run_one(resource_type, source_id, options).await })
    }

    /// Read-only walk of the migration plan. Consults the ledger so already
    /// migrated pairs aren't reported as work, but writes nothing and calls
    /// no mutating handler methods.
    async fn dry_run_one(
        &self,
        resource_type: ResourceType,
        source_id: String,
        options: MigrateOptions,
    ) -> Result<Migration, MigrateError> {
        let handler = self.registry.get(&resource_type)?;

        let existing = self
            .ledger
            .query(&MigrationFilter::by_resource(&resource_type, &source_id))
            .await?;
        if let Some(first) = existing.into_iter().next() {
            if first.is_migrated() {
                info!(
                    "Already migrated {} resource: {} (migration {}, status {}), \
                     skipping duplicate migration",
                    resource_type,
                    source_id,
                    uuid_str(&first),
                    first.status,
                );
                return Ok(first);
            }
        }

        if self.is_in_flight(&resource_type, &source_id) {
            return Err(MigrateError::InvariantViolation(format!(
                "dependency cycle detected involving {} {}",
                resource_type, source_id
            )));
        }

        info!(
            "DRY-RUN: migrating {} resource: {}, cleanup source: {}",
            resource_type, source_id, options.cleanup_source
        );

        self.push_in_flight(&resource_type, &source_id);
        let result = self
            .dry_run_walk(handler.as_ref(), &source_id, options)
            .await;
        self.pop_in_flight(&resource_type, &source_id);
        result?;

        // Nothing was persisted; hand back a blank record describing what a
        // real run would create.
        Ok(Migration::new(
            handler.service_tag(),
            resource_type,
            &self.source_cloud,
            &self.destination_cloud,
            source_id,
        ))
    }

    async fn dry_run_walk(
        &self,
        handler: &dyn MigrationHandler,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<(), MigrateError> {
        if options.include_dependencies {
            let deps = partition_dependencies(self.ledger.as_ref(), handler, source_id).await?;
            for dependency in &deps.pending {
                info!(
                    "DRY-RUN: migrating associated {} resource: {}",
                    dependency.resource_type, dependency.source_id
                );
                self.dry_run_boxed(
                    dependency.resource_type.clone(),
                    dependency.source_id.clone(),
                    options.for_dependency(),
                )
                .await?;
            }
            for record in &deps.migrated {
                info!(
                    "DRY-RUN: already migrated associated {} resource: {} -> {}",
                    record.resource_type,
                    record.source_id,
                    record.destination_id.as_deref().unwrap_or("-"),
                );
            }
        }
        if options.include_members {
            let members = handler.members(source_id).await?;
            for member in members {
                info!(
                    "DRY-RUN: migrating member {} resource: {}",
                    member.resource_type, member.source_id
                );
                self.dry_run_boxed(member.resource_type, member.source_id, options)
                    .await?;
            }
        }
        Ok(())
    }

    // ── In-flight stack ───────────────────────────────────────────────────────

    fn push_in_flight(&self, resource_type: &ResourceType, source_id: &str) {
        self.in_flight
            .lock()
            .expect("in-flight stack poisoned")
            .push((resource_type.clone(), source_id.to_string()));
    }

    fn pop_in_flight(&self, resource_type: &ResourceType, source_id: &str) {
        let mut stack = self.in_flight.lock().expect("in-flight stack poisoned");
        if let Some(pos) = stack
            .iter()
            .rposition(|(ty, id)| ty == resource_type && id == source_id)
        {
            stack.remove(pos);
        }
    }

    fn is_in_flight(&self, resource_type: &ResourceType, source_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight stack poisoned")
            .iter()
            .any(|(ty, id)| ty == resource_type && id == source_id)
    }
}

// Handlers receive the orchestrator behind this narrow capability so
// auxiliary transfers (volume → intermediate image) reuse the standard
// gate and ledger bookkeeping.
#[async_trait]
impl SubMigrate for Orchestrator {
    async fn migrate(
        &self,
        resource_type: &ResourceType,
        source_id: &str,
        options: MigrateOptions,
    ) -> Result<MigratedDependency, HandlerError> {
        let migration = Orchestrator::migrate(self, resource_type, source_id, options)
            .await
            .map_err(|e| HandlerError::SubMigration(e.to_string()))?;
        to_migrated_dependency(&migration).map_err(|e| HandlerError::SubMigration(e.to_string()))
    }
}

fn uuid_str(record: &Migration) -> String {
    record
        .uuid
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unsaved>".into())
}
