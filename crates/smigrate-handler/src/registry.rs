use std::collections::HashMap;
use std::sync::Arc;

use smigrate_domain::ResourceType;

use crate::error::HandlerError;
use crate::handler::MigrationHandler;

/// Dispatches migration calls to the [`MigrationHandler`] registered for a
/// resource type.
///
/// Populated once at process start; read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ResourceType, Arc<dyn MigrationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a resource type. Returns `&mut self` for chaining.
    pub fn register(
        &mut self,
        resource_type: impl Into<ResourceType>,
        handler: Arc<dyn MigrationHandler>,
    ) -> &mut Self {
        self.handlers.insert(resource_type.into(), handler);
        self
    }

    /// Resolve the handler for the given resource type.
    pub fn get(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Arc<dyn MigrationHandler>, HandlerError> {
        self.handlers
            .get(resource_type)
            .cloned()
            .ok_or_else(|| HandlerError::UnsupportedType(resource_type.to_string()))
    }

    /// All registered resource types, sorted for stable display.
    pub fn resource_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<ResourceType> = self.handlers.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceType, &Arc<dyn MigrationHandler>)> {
        self.handlers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
