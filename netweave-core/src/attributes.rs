//! Attribute keys written into graph documents.
//!
//! The full set is fixed here so that exporters and reports can rely on it.

use netweave_scanner::EntityDetails;

/// Interaction time of a commenter edge, RFC 3339
pub const TIMESTAMP: &str = "timestamp";
/// Permalink of the interaction behind a commenter edge
pub const REFERENCE_URL: &str = "url";

pub const REAL_NAME: &str = "real_name";
pub const LOCATION: &str = "location";
pub const PROFILE_URL: &str = "profile_url";
pub const PHOTOS_URL: &str = "photos_url";
pub const IMAGE_URL: &str = "image_url";
pub const PHOTO_COUNT: &str = "photo_count";
pub const IS_PRO: &str = "is_pro";

pub const EDGE_KEYS: &[&str] = &[TIMESTAMP, REFERENCE_URL];

pub const VERTEX_KEYS: &[&str] = &[
    REAL_NAME,
    LOCATION,
    PROFILE_URL,
    PHOTOS_URL,
    IMAGE_URL,
    PHOTO_COUNT,
    IS_PRO,
];

/// Vertex attributes for fetched details, in `VERTEX_KEYS` order, skipping unknown values
pub fn detail_attributes(details: &EntityDetails) -> Vec<(&'static str, String)> {
    let values = [
        (REAL_NAME, details.real_name.clone()),
        (LOCATION, details.location.clone()),
        (PROFILE_URL, details.profile_url.clone()),
        (PHOTOS_URL, details.photos_url.clone()),
        (IMAGE_URL, details.image_url.clone()),
        (PHOTO_COUNT, details.photo_count.map(|c| c.to_string())),
        (IS_PRO, details.is_pro.map(|p| p.to_string())),
    ];

    values
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
}
