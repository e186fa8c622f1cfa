use crate::error::{Result, ServiceError};
use crate::model::Entity;
use crate::source::NetworkSource;
use tracing::info;

/// Resolves a typed handle to the entity's canonical id and handle
pub struct EntityResolver<'a> {
    source: &'a dyn NetworkSource,
}

impl<'a> EntityResolver<'a> {
    pub fn new(source: &'a dyn NetworkSource) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, handle: &str) -> Result<Entity> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(ServiceError::not_found(handle));
        }

        let entity = self.source.find_entity(handle).await?;
        if entity.id.is_empty() {
            return Err(ServiceError::Protocol(format!(
                "Lookup of '{}' returned an entity without an id",
                handle
            )));
        }

        info!("Resolved '{}' to {} ({})", handle, entity.handle, entity.id);
        Ok(entity)
    }
}
