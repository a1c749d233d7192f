use smigrate_domain::{IdMap, MigratedDependency};
use smigrate_ledger::Migration;

use crate::error::MigrateError;

/// Promote a ledger record to the shape handlers consume.
///
/// A record that the resolver counted as migrated must carry a destination
/// id; a blank one means the ledger and the resolver disagree, which is a
/// corruption indicator rather than something to paper over.
pub fn to_migrated_dependency(record: &Migration) -> Result<MigratedDependency, MigrateError> {
    let destination_id = match record.destination_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(MigrateError::InvariantViolation(format!(
                "migration {} for {} {} is in status {} but has no destination id",
                record
                    .uuid
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unsaved>".into()),
                record.resource_type,
                record.source_id,
                record.status,
            )))
        }
    };
    Ok(MigratedDependency::new(
        record.resource_type.clone(),
        record.source_id.clone(),
        destination_id,
    ))
}

/// Build the `(type, source_id) → destination_id` map a handler needs to
/// rewrite foreign references, from the resolver's migrated partition.
pub fn project_id_map(records: &[Migration]) -> Result<IdMap, MigrateError> {
    let mut map = IdMap::new();
    for record in records {
        map.push(to_migrated_dependency(record)?);
    }
    Ok(map)
}
