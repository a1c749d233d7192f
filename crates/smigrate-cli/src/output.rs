use smigrate_handler::HandlerRegistry;
use smigrate_ledger::Migration;

/// Render migrations as a fixed-width table.
pub fn render_migrations_table(migrations: &[Migration]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<38} {:<14} {:<16} {:<22} {:<38} {}\n",
        "UUID", "SERVICE", "RESOURCE TYPE", "STATUS", "SOURCE ID", "DESTINATION ID"
    ));
    out.push_str(&format!("{}\n", "-".repeat(150)));
    for migration in migrations {
        out.push_str(&format!(
            "{:<38} {:<14} {:<16} {:<22} {:<38} {}\n",
            uuid_or_dash(migration),
            migration.service,
            migration.resource_type,
            migration.status,
            short_id(&migration.source_id),
            migration
                .destination_id
                .as_deref()
                .map(short_id)
                .unwrap_or_else(|| "-".into()),
        ));
    }
    out
}

/// Render one migration as field/value rows.
pub fn render_migration_detail(migration: &Migration) -> String {
    let mut out = String::new();
    let mut row = |field: &str, value: String| {
        out.push_str(&format!("{:<20} {}\n", field, value));
    };

    row("Uuid", uuid_or_dash(migration));
    row("Created at", timestamp_or_dash(&migration.created_at));
    row("Updated at", timestamp_or_dash(&migration.updated_at));
    row("Service", migration.service.clone());
    row("Resource type", migration.resource_type.to_string());
    row("Source cloud", migration.source_cloud.clone());
    row("Destination cloud", migration.destination_cloud.clone());
    row("Source id", migration.source_id.clone());
    row(
        "Destination id",
        migration
            .destination_id
            .clone()
            .unwrap_or_else(|| "-".into()),
    );
    row("Status", migration.status.to_string());
    row(
        "Error message",
        migration
            .error_message
            .clone()
            .unwrap_or_else(|| "-".into()),
    );
    row("Archived", migration.archived.to_string());
    row("Source removed", migration.source_removed.to_string());
    row("External", migration.external.to_string());
    out
}

/// Render the registry overview: one row per handler.
pub fn render_capabilities_table(registry: &HandlerRegistry) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:<16} {:<24} {:<28} {}\n",
        "SERVICE", "RESOURCE TYPE", "MEMBER TYPES", "ASSOCIATED TYPES", "BATCH FILTERS"
    ));
    out.push_str(&format!("{}\n", "-".repeat(110)));
    for resource_type in registry.resource_types() {
        // resource_types() only returns registered keys.
        let Ok(handler) = registry.get(&resource_type) else {
            continue;
        };
        out.push_str(&format!(
            "{:<16} {:<16} {:<24} {:<28} {}\n",
            handler.service_tag(),
            resource_type,
            join_or_dash(handler.member_types().iter().map(|t| t.to_string())),
            join_or_dash(handler.associated_types().iter().map(|t| t.to_string())),
            join_or_dash(handler.supported_filters().into_iter()),
        ));
    }
    out
}

/// Render the capabilities of one handler as field/value rows.
pub fn render_capability_detail(
    registry: &HandlerRegistry,
    resource_type: &smigrate_domain::ResourceType,
) -> Result<String, smigrate_handler::HandlerError> {
    let handler = registry.get(resource_type)?;
    let mut out = String::new();
    out.push_str(&format!("{:<28} {}\n", "Service", handler.service_tag()));
    out.push_str(&format!("{:<28} {}\n", "Resource type", resource_type));
    out.push_str(&format!(
        "{:<28} {}\n",
        "Member resource types",
        join_or_dash(handler.member_types().iter().map(|t| t.to_string())),
    ));
    out.push_str(&format!(
        "{:<28} {}\n",
        "Associated resource types",
        join_or_dash(handler.associated_types().iter().map(|t| t.to_string())),
    ));
    out.push_str(&format!(
        "{:<28} {}\n",
        "Batch resource filters",
        join_or_dash(handler.supported_filters().into_iter()),
    ));
    Ok(out)
}

fn join_or_dash(items: impl Iterator<Item = String>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

fn uuid_or_dash(migration: &Migration) -> String {
    migration
        .uuid
        .map(|u| u.to_string())
        .unwrap_or_else(|| "-".into())
}

fn timestamp_or_dash(ts: &Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into())
}

/// Keep key/secret style URL identifiers readable: show only the trailing
/// path segment in tables. The full value stays available through `show`.
fn short_id(id: &str) -> String {
    match id.rsplit_once('/') {
        Some((_, tail)) if !tail.is_empty() => tail.to_string(),
        _ => id.to_string(),
    }
}
