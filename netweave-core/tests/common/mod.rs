// Scripted in-memory network source shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use netweave_scanner::error::Result;
use netweave_scanner::{
    CancelFlag, Entity, EntityDetails, NetworkSource, ParentItem, RelationshipRecord, ServiceError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn id_of(handle: &str) -> String {
    format!("id-{}", handle)
}

pub fn comment_time(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

#[derive(Debug, Default)]
pub struct Calls {
    /// `(entity_id, page)` of every contact page request
    pub contact_pages: Vec<(String, u32)>,
    pub photo_pages: Vec<(String, u32)>,
    pub comments: usize,
    pub details: Vec<String>,
}

struct Photo {
    id: String,
    commenters: Vec<(String, DateTime<Utc>)>,
}

/// Users are identified by handle; their canonical id is `id-<handle>`
#[derive(Default)]
pub struct ScriptedSource {
    users: HashSet<String>,
    contacts: HashMap<String, Vec<String>>,
    photos: HashMap<String, Vec<Photo>>,
    /// The service never returns more than this many items per page
    page_limit: Option<usize>,
    failing_contact_pages: HashSet<(String, u32)>,
    failing_photo_pages: HashSet<(String, u32)>,
    failing_details: HashSet<String>,
    /// Trip this flag when the n-th details request arrives (1-based)
    cancel_on_details: Option<(usize, CancelFlag)>,
    pub calls: Mutex<Calls>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, handle: &str) -> Self {
        self.users.insert(handle.to_string());
        self
    }

    pub fn contacts(mut self, handle: &str, others: &[&str]) -> Self {
        self.users.insert(handle.to_string());
        for other in others {
            self.users.insert(other.to_string());
        }
        self.contacts
            .entry(handle.to_string())
            .or_default()
            .extend(others.iter().map(|o| o.to_string()));
        self
    }

    /// Add a photo owned by `handle` with comments from `commenters`
    pub fn photo(mut self, handle: &str, photo_id: &str, commenters: &[&str]) -> Self {
        self.users.insert(handle.to_string());
        let commenters = commenters
            .iter()
            .enumerate()
            .map(|(i, c)| {
                self.users.insert(c.to_string());
                (c.to_string(), comment_time(i as u32))
            })
            .collect();
        self.photos
            .entry(handle.to_string())
            .or_default()
            .push(Photo {
                id: photo_id.to_string(),
                commenters,
            });
        self
    }

    pub fn page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn fail_contact_page(mut self, handle: &str, page: u32) -> Self {
        self.failing_contact_pages.insert((id_of(handle), page));
        self
    }

    pub fn fail_photo_page(mut self, handle: &str, page: u32) -> Self {
        self.failing_photo_pages.insert((id_of(handle), page));
        self
    }

    pub fn fail_details(mut self, handle: &str) -> Self {
        self.failing_details.insert(id_of(handle));
        self
    }

    pub fn cancel_on_details(mut self, nth: usize, cancel: CancelFlag) -> Self {
        self.cancel_on_details = Some((nth, cancel));
        self
    }

    pub fn contact_page_requests(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().contact_pages.clone()
    }

    pub fn photo_page_requests(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().photo_pages.clone()
    }

    pub fn comment_requests(&self) -> usize {
        self.calls.lock().unwrap().comments
    }

    pub fn details_requests(&self) -> Vec<String> {
        self.calls.lock().unwrap().details.clone()
    }

    fn handle_of(&self, entity_id: &str) -> String {
        entity_id.trim_start_matches("id-").to_string()
    }

    fn page<T: Clone>(&self, items: &[T], page: u32, per_page: u32) -> Vec<T> {
        let size = match self.page_limit {
            Some(limit) => limit.min(per_page as usize),
            None => per_page as usize,
        };
        let start = (page as usize - 1) * size;
        items.iter().skip(start).take(size).cloned().collect()
    }
}

fn denied() -> ServiceError {
    ServiceError::Permanent {
        code: 2,
        message: "Insufficient permissions".to_string(),
    }
}

#[async_trait]
impl NetworkSource for ScriptedSource {
    async fn find_entity(&self, handle: &str) -> Result<Entity> {
        self.users
            .iter()
            .find(|u| u.eq_ignore_ascii_case(handle))
            .map(|u| Entity::new(id_of(u), u.clone()))
            .ok_or_else(|| ServiceError::not_found(handle))
    }

    async fn contacts_page(
        &self,
        entity_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RelationshipRecord>> {
        self.calls
            .lock()
            .unwrap()
            .contact_pages
            .push((entity_id.to_string(), page));

        if self.failing_contact_pages.contains(&(entity_id.to_string(), page)) {
            return Err(denied());
        }

        let contacts = self
            .contacts
            .get(&self.handle_of(entity_id))
            .cloned()
            .unwrap_or_default();

        Ok(self
            .page(&contacts, page, per_page)
            .into_iter()
            .map(|handle| RelationshipRecord::new(Entity::new(id_of(&handle), handle)))
            .collect())
    }

    async fn photos_page(
        &self,
        entity_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ParentItem>> {
        self.calls
            .lock()
            .unwrap()
            .photo_pages
            .push((entity_id.to_string(), page));

        if self.failing_photo_pages.contains(&(entity_id.to_string(), page)) {
            return Err(denied());
        }

        let ids: Vec<String> = self
            .photos
            .get(&self.handle_of(entity_id))
            .map(|photos| photos.iter().map(|p| p.id.clone()).collect())
            .unwrap_or_default();

        Ok(self
            .page(&ids, page, per_page)
            .into_iter()
            .map(|id| ParentItem {
                id,
                owner: entity_id.to_string(),
                title: None,
            })
            .collect())
    }

    async fn comments(&self, photo: &ParentItem) -> Result<Vec<RelationshipRecord>> {
        self.calls.lock().unwrap().comments += 1;

        let photos = self
            .photos
            .get(&self.handle_of(&photo.owner))
            .ok_or_else(|| ServiceError::Permanent {
                code: 1,
                message: "Photo not found".to_string(),
            })?;
        let Some(found) = photos.iter().find(|p| p.id == photo.id) else {
            return Ok(Vec::new());
        };

        Ok(found
            .commenters
            .iter()
            .enumerate()
            .map(|(i, (handle, at))| {
                RelationshipRecord::new(Entity::new(id_of(handle), handle.clone()))
                    .with_timestamp(*at)
                    .with_reference_url(format!(
                        "https://photos.example.com/{}/{}#comment{}",
                        photo.owner, photo.id, i
                    ))
            })
            .collect())
    }

    async fn entity_details(&self, entity_id: &str) -> Result<EntityDetails> {
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.details.push(entity_id.to_string());
            calls.details.len()
        };

        if let Some((trip_at, cancel)) = &self.cancel_on_details
            && nth == *trip_at
        {
            cancel.cancel();
        }

        if self.failing_details.contains(entity_id) {
            return Err(ServiceError::Transient("connection reset".to_string()));
        }

        let handle = self.handle_of(entity_id);
        Ok(EntityDetails {
            real_name: Some(format!("{} Example", handle)),
            location: Some("Lisbon".to_string()),
            photo_count: Some(handle.len() as u64),
            ..EntityDetails::default()
        })
    }
}
