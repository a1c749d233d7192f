use smigrate_domain::{Dependency, IdMap, ResourceType};
use tracing::debug;

use crate::error::HandlerError;

/// Owner ids resolved for a destination-side create call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityParams {
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

/// Append the owning project/user of a source resource to a handler's
/// dependency list.
///
/// Only meaningful in multitenant mode: the identity resources then become
/// prerequisites so the destination resource can be created under the mapped
/// owner. Identity resources are always shared, so they are never flagged for
/// cascading cleanup.
pub fn push_identity_dependencies(
    deps: &mut Vec<Dependency>,
    multitenant: bool,
    project_id: Option<&str>,
    user_id: Option<&str>,
) {
    if !multitenant {
        debug!("multitenant mode disabled, identity resources not reported as dependencies");
        return;
    }
    if let Some(project_id) = project_id {
        deps.push(Dependency::new("project", project_id));
    }
    if let Some(user_id) = user_id {
        deps.push(Dependency::new("user", user_id));
    }
}

/// Resolve the destination-side owner of the resource about to be created.
///
/// The mapped ids come through the standard migrated-dependency channel;
/// a miss means the identity dependency was never migrated.
pub fn identity_create_params(
    deps: &IdMap,
    multitenant: bool,
    source_project_id: Option<&str>,
    source_user_id: Option<&str>,
) -> Result<IdentityParams, HandlerError> {
    let mut params = IdentityParams::default();
    if !multitenant {
        debug!("multitenant mode disabled, skipping identity parameters");
        return Ok(params);
    }

    if let Some(project_id) = source_project_id {
        params.project_id = Some(
            deps.destination_id(&ResourceType::new("project"), project_id)?
                .to_string(),
        );
    }
    if let Some(user_id) = source_user_id {
        params.user_id = Some(
            deps.destination_id(&ResourceType::new("user"), user_id)?
                .to_string(),
        );
    }
    debug!(?params, "resolved identity parameters");
    Ok(params)
}
