//! The seam between the crawler and the remote service.

use crate::error::Result;
use crate::model::{Entity, EntityDetails, ParentItem, RelationshipRecord};
use async_trait::async_trait;

/// Paged listings exposed by the service, with their protocol page-size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Contacts,
    Photos,
}

impl Listing {
    /// Largest `per_page` value the service accepts for this listing
    pub fn protocol_max(&self) -> u32 {
        match self {
            Listing::Contacts => 1000,
            Listing::Photos => 500,
        }
    }
}

/// Remote relationship service.
///
/// Every call is a single request; retries and backoff, if any, live
/// inside the implementation. Page indices start at 1, and a page past the
/// end of a listing must come back empty.
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Look up an entity by handle, in any casing
    async fn find_entity(&self, handle: &str) -> Result<Entity>;

    /// One page of the entity's public contacts
    async fn contacts_page(
        &self,
        entity_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RelationshipRecord>>;

    /// One page of the entity's public photos
    async fn photos_page(&self, entity_id: &str, page: u32, per_page: u32)
    -> Result<Vec<ParentItem>>;

    /// All comments on a photo, one record per comment author
    async fn comments(&self, photo: &ParentItem) -> Result<Vec<RelationshipRecord>>;

    /// Detail attributes for an entity
    async fn entity_details(&self, entity_id: &str) -> Result<EntityDetails>;
}
