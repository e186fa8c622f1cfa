use crate::cancel::CancelFlag;
use crate::error::Result;
use crate::model::{ParentItem, RelationKind, RelationshipRecord};
use crate::pager::{PageCounters, PageEnumerator, PageFn, PagePolicy};
use crate::source::{Listing, NetworkSource};
use futures::FutureExt;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Request counters for one relationship stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounters {
    pub pages: PageCounters,
    /// Unpaginated child fetches issued in the derived shape
    pub child_fetches: usize,
    pub child_fetches_failed: usize,
}

/// Opens relationship streams for one entity and one relation kind.
///
/// Contacts come from a single paged listing. Commenters are derived: the
/// entity's photos are paged through and each photo's comments are fetched
/// with one further request.
pub struct RelationshipFetcher<'a> {
    source: &'a dyn NetworkSource,
    max_per_request: Option<usize>,
    cancel: CancelFlag,
}

impl<'a> RelationshipFetcher<'a> {
    pub fn new(source: &'a dyn NetworkSource, cancel: CancelFlag) -> Self {
        Self {
            source,
            max_per_request: None,
            cancel,
        }
    }

    pub fn with_max_per_request(mut self, max_per_request: Option<usize>) -> Self {
        self.max_per_request = max_per_request;
        self
    }

    pub fn open(
        &self,
        entity_id: &str,
        kind: RelationKind,
        tolerate_first_page_failure: bool,
    ) -> RelationshipStream<'a> {
        let policy = PagePolicy::new(self.max_per_request)
            .tolerate_first_page_failure(tolerate_first_page_failure);
        let source = self.source;
        let id = entity_id.to_string();

        let shape = match kind {
            RelationKind::Contact => {
                let fetch: PageFn<'a, RelationshipRecord> =
                    Box::new(move |page: u32, per_page: u32| {
                        let id = id.clone();
                        async move { source.contacts_page(&id, page, per_page).await }.boxed()
                    });
                Shape::Direct(PageEnumerator::new(
                    fetch,
                    Listing::Contacts.protocol_max(),
                    policy,
                    self.cancel.clone(),
                ))
            }
            RelationKind::Commenter => {
                let fetch: PageFn<'a, ParentItem> = Box::new(move |page: u32, per_page: u32| {
                    let id = id.clone();
                    async move { source.photos_page(&id, page, per_page).await }.boxed()
                });
                Shape::Derived {
                    parents: PageEnumerator::new(
                        fetch,
                        Listing::Photos.protocol_max(),
                        policy,
                        self.cancel.clone(),
                    ),
                    pending: VecDeque::new(),
                }
            }
        };

        RelationshipStream {
            shape,
            source,
            cancel: self.cancel.clone(),
            child_fetches: 0,
            child_fetches_failed: 0,
        }
    }
}

enum Shape<'a> {
    Direct(PageEnumerator<'a, RelationshipRecord>),
    Derived {
        parents: PageEnumerator<'a, ParentItem>,
        pending: VecDeque<RelationshipRecord>,
    },
}

/// Lazy sequence of raw relationship records
pub struct RelationshipStream<'a> {
    shape: Shape<'a>,
    source: &'a dyn NetworkSource,
    cancel: CancelFlag,
    child_fetches: usize,
    child_fetches_failed: usize,
}

impl<'a> RelationshipStream<'a> {
    pub async fn next(&mut self) -> Result<Option<RelationshipRecord>> {
        match &mut self.shape {
            Shape::Direct(records) => records.next().await,
            Shape::Derived { parents, pending } => loop {
                if let Some(record) = pending.pop_front() {
                    return Ok(Some(record));
                }

                let Some(photo) = parents.next().await? else {
                    return Ok(None);
                };

                self.cancel.check()?;
                self.child_fetches += 1;
                debug!("Fetching comments for photo {}", photo.id);

                // One photo's comments failing only loses that photo
                match self.source.comments(&photo).await {
                    Ok(records) => pending.extend(records),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        self.child_fetches_failed += 1;
                        warn!("Skipping comments for photo {}: {}", photo.id, e);
                    }
                }
            },
        }
    }

    pub fn counters(&self) -> FetchCounters {
        let pages = match &self.shape {
            Shape::Direct(records) => records.counters(),
            Shape::Derived { parents, .. } => parents.counters(),
        };
        FetchCounters {
            pages,
            child_fetches: self.child_fetches,
            child_fetches_failed: self.child_fetches_failed,
        }
    }
}
