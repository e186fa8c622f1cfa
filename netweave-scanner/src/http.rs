use crate::error::{Result, ServiceError};
use crate::model::{Entity, EntityDetails, ParentItem, RelationshipRecord};
use crate::source::NetworkSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.flickr.com/services/rest/";

const DEFAULT_BUDDY_ICON: &str = "https://www.flickr.com/images/buddyicon.gif";

/// `NetworkSource` over the photo service's REST JSON endpoint.
///
/// The API key is forwarded as-is on every request.
pub struct HttpSource {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpSource {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, 30)
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("netweave/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ServiceError::Client(e.to_string()))?;

        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", DEFAULT_BASE_URL, e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(self)
    }

    /// Call one API method and return the payload of a `"stat": "ok"` response
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("method", method)
                .append_pair("api_key", &self.api_key)
                .append_pair("format", "json")
                .append_pair("nojsoncallback", "1");
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }

        debug!("GET {} {:?}", method, params);
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("{} answered {} in {:?}", method, status, start.elapsed());

        if !status.is_success() {
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                ServiceError::Transient(format!("{} returned HTTP {}", method, status))
            } else {
                ServiceError::Permanent {
                    code: status.as_u16() as i64,
                    message: format!("{} returned HTTP {}", method, status),
                }
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        match value.get("stat").and_then(Value::as_str) {
            Some("ok") => Ok(serde_json::from_value(value)?),
            Some("fail") => Err(ServiceError::Permanent {
                code: value.get("code").and_then(lenient_i64).unwrap_or(0),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            _ => Err(ServiceError::Protocol(format!(
                "{} response has no recognizable status",
                method
            ))),
        }
    }
}

#[async_trait]
impl NetworkSource for HttpSource {
    async fn find_entity(&self, handle: &str) -> Result<Entity> {
        let found: UserEnvelope = self
            .call(
                "flickr.people.findByUsername",
                &[("username", handle.to_string())],
            )
            .await
            .map_err(|e| match e {
                ServiceError::Permanent { code: 1, .. } => ServiceError::not_found(handle),
                other => other,
            })?;

        Ok(Entity::new(found.user.id, found.user.username.content))
    }

    async fn contacts_page(
        &self,
        entity_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RelationshipRecord>> {
        let listing: ContactsEnvelope = self
            .call(
                "flickr.contacts.getPublicList",
                &[
                    ("user_id", entity_id.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;

        // The service repeats its last page for out-of-range requests
        if listing.contacts.pages.is_some_and(|pages| page > pages) {
            return Ok(Vec::new());
        }

        Ok(listing
            .contacts
            .contact
            .into_iter()
            .map(|c| RelationshipRecord::new(Entity::new(c.nsid, c.username)))
            .collect())
    }

    async fn photos_page(
        &self,
        entity_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ParentItem>> {
        let listing: PhotosEnvelope = self
            .call(
                "flickr.people.getPublicPhotos",
                &[
                    ("user_id", entity_id.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;

        if listing.photos.pages.is_some_and(|pages| page > pages) {
            return Ok(Vec::new());
        }

        Ok(listing
            .photos
            .photo
            .into_iter()
            .map(|p| ParentItem {
                id: p.id,
                owner: p.owner.unwrap_or_else(|| entity_id.to_string()),
                title: p.title.filter(|t| !t.is_empty()),
            })
            .collect())
    }

    async fn comments(&self, photo: &ParentItem) -> Result<Vec<RelationshipRecord>> {
        let listing: CommentsEnvelope = self
            .call(
                "flickr.photos.comments.getList",
                &[("photo_id", photo.id.clone())],
            )
            .await?;

        Ok(listing
            .comments
            .comment
            .into_iter()
            .map(|c| {
                let mut record = RelationshipRecord::new(Entity::new(c.author, c.authorname));
                if let Some(created) = c.datecreate.as_ref().and_then(parse_unix_timestamp) {
                    record = record.with_timestamp(created);
                }
                if let Some(permalink) = c.permalink {
                    record = record.with_reference_url(permalink);
                }
                record
            })
            .collect())
    }

    async fn entity_details(&self, entity_id: &str) -> Result<EntityDetails> {
        let info: PersonEnvelope = self
            .call("flickr.people.getInfo", &[("user_id", entity_id.to_string())])
            .await?;
        let person = info.person;

        let icon_server = person.iconserver.as_ref().and_then(lenient_i64).unwrap_or(0);
        let image_url = if icon_server > 0 {
            format!(
                "https://farm{}.staticflickr.com/{}/buddyicons/{}.jpg",
                person.iconfarm.as_ref().and_then(lenient_i64).unwrap_or(0),
                icon_server,
                person.id
            )
        } else {
            DEFAULT_BUDDY_ICON.to_string()
        };

        Ok(EntityDetails {
            real_name: content_of(person.realname),
            location: content_of(person.location),
            profile_url: content_of(person.profileurl),
            photos_url: content_of(person.photosurl),
            image_url: Some(image_url),
            photo_count: person
                .photos
                .and_then(|p| p.count)
                .and_then(|c| lenient_i64(&c.content))
                .and_then(|c| u64::try_from(c).ok()),
            is_pro: person.ispro.as_ref().and_then(lenient_i64).map(|p| p != 0),
        })
    }
}

/// Numbers arrive either as JSON numbers or as strings
fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(lenient_i64)
        .and_then(|n| u32::try_from(n).ok()))
}

fn parse_unix_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    lenient_i64(value).and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn content_of(field: Option<Content>) -> Option<String> {
    field.map(|c| c.text()).filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
struct Content {
    #[serde(rename = "_content")]
    content: Value,
}

impl Content {
    fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: FoundUser,
}

#[derive(Deserialize)]
struct FoundUser {
    id: String,
    username: StringContent,
}

#[derive(Deserialize)]
struct StringContent {
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Deserialize)]
struct ContactsEnvelope {
    contacts: ContactList,
}

#[derive(Deserialize)]
struct ContactList {
    #[serde(default, deserialize_with = "lenient_u32")]
    pages: Option<u32>,
    #[serde(default)]
    contact: Vec<Contact>,
}

#[derive(Deserialize)]
struct Contact {
    nsid: String,
    username: String,
}

#[derive(Deserialize)]
struct PhotosEnvelope {
    photos: PhotoList,
}

#[derive(Deserialize)]
struct PhotoList {
    #[serde(default, deserialize_with = "lenient_u32")]
    pages: Option<u32>,
    #[serde(default)]
    photo: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    id: String,
    owner: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct CommentsEnvelope {
    comments: CommentList,
}

#[derive(Deserialize)]
struct CommentList {
    #[serde(default)]
    comment: Vec<Comment>,
}

#[derive(Deserialize)]
struct Comment {
    author: String,
    authorname: String,
    datecreate: Option<Value>,
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct PersonEnvelope {
    person: Person,
}

#[derive(Deserialize)]
struct Person {
    id: String,
    ispro: Option<Value>,
    iconserver: Option<Value>,
    iconfarm: Option<Value>,
    realname: Option<Content>,
    location: Option<Content>,
    photosurl: Option<Content>,
    profileurl: Option<Content>,
    photos: Option<PhotoStats>,
}

#[derive(Deserialize)]
struct PhotoStats {
    count: Option<Content>,
}
