use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved account on the remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical, stable identifier assigned by the service
    pub id: String,
    /// Human-readable handle, canonically cased once resolved
    pub handle: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
        }
    }
}

/// Semantic type and direction of a discovered relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The root lists the other entity as a contact
    Contact,
    /// The other entity commented on one of the root's photos
    Commenter,
}

impl RelationKind {
    pub const ALL: [RelationKind; 2] = [RelationKind::Contact, RelationKind::Commenter];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contact => "contact",
            RelationKind::Commenter => "commenter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "contact" | "contacts" => Some(RelationKind::Contact),
            "commenter" | "commenters" => Some(RelationKind::Commenter),
            _ => None,
        }
    }

    /// Whether edges of this kind run from the other entity to the root
    pub fn points_to_root(&self) -> bool {
        matches!(self, RelationKind::Commenter)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw relationship as yielded by a fetcher, before any policy is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub other: Entity,
    pub timestamp: Option<DateTime<Utc>>,
    pub reference_url: Option<String>,
}

impl RelationshipRecord {
    pub fn new(other: Entity) -> Self {
        Self {
            other,
            timestamp: None,
            reference_url: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = Some(url.into());
        self
    }
}

/// Item of the parent listing in a derived fetch (a photo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentItem {
    pub id: String,
    pub owner: String,
    pub title: Option<String>,
}

/// Detail attributes fetched for one entity during enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDetails {
    pub real_name: Option<String>,
    pub location: Option<String>,
    pub profile_url: Option<String>,
    pub photos_url: Option<String>,
    pub image_url: Option<String>,
    pub photo_count: Option<u64>,
    pub is_pro: Option<bool>,
}
