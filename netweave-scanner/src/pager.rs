use crate::cancel::CancelFlag;
use crate::error::Result;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Fetches one page: `(page_index, page_size) -> items`. Page indices start at 1.
pub type PageFn<'a, T> = Box<dyn FnMut(u32, u32) -> BoxFuture<'a, Result<Vec<T>>> + Send + 'a>;

/// How an enumeration is bounded and how it treats a failing first page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagePolicy {
    /// Stop after this many items. `None` means unlimited.
    pub item_cap: Option<usize>,
    /// Partial results already exist elsewhere in the crawl, so a failing
    /// first page ends the listing instead of failing it.
    pub tolerate_first_page_failure: bool,
}

impl PagePolicy {
    pub fn new(item_cap: Option<usize>) -> Self {
        Self {
            item_cap,
            tolerate_first_page_failure: false,
        }
    }

    pub fn tolerate_first_page_failure(mut self, tolerate: bool) -> Self {
        self.tolerate_first_page_failure = tolerate;
        self
    }
}

/// Request counters for one enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounters {
    /// Page fetch calls issued, including ones that failed
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Failed pages that ended the listing silently
    pub pages_swallowed: usize,
    /// The first page failed and was swallowed under the tolerance policy
    pub first_page_swallowed: bool,
}

/// `min(cap, protocol_max)`, never below one item per page
pub fn page_size_for(item_cap: Option<usize>, protocol_max: u32) -> u32 {
    match item_cap {
        Some(cap) => cap.clamp(1, protocol_max.max(1) as usize) as u32,
        None => protocol_max.max(1),
    }
}

/// Lazy, finite, non-restartable sequence over a paged listing.
///
/// Ends on an empty page, on reaching the item cap, or on a page error.
/// Errors past the first page are swallowed; a first-page error is swallowed
/// only under [`PagePolicy::tolerate_first_page_failure`]. Cancellation is
/// checked before every page fetch and is never swallowed.
pub struct PageEnumerator<'a, T> {
    fetch_page: PageFn<'a, T>,
    page_size: u32,
    policy: PagePolicy,
    cancel: CancelFlag,
    next_page: u32,
    buffered: VecDeque<T>,
    yielded: usize,
    exhausted: bool,
    counters: PageCounters,
}

impl<'a, T: Send + 'a> PageEnumerator<'a, T> {
    pub fn new(
        fetch_page: PageFn<'a, T>,
        protocol_max: u32,
        policy: PagePolicy,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            fetch_page,
            page_size: page_size_for(policy.item_cap, protocol_max),
            policy,
            cancel,
            next_page: 1,
            buffered: VecDeque::new(),
            yielded: 0,
            exhausted: false,
            counters: PageCounters::default(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn counters(&self) -> PageCounters {
        self.counters
    }

    fn cap_reached(&self) -> bool {
        self.policy
            .item_cap
            .is_some_and(|cap| self.yielded >= cap)
    }

    /// Next item, fetching the next page when the current one is drained
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if self.cap_reached() {
                self.exhausted = true;
                self.buffered.clear();
                return Ok(None);
            }

            if let Some(item) = self.buffered.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }

            if self.exhausted {
                return Ok(None);
            }

            if let Err(e) = self.cancel.check() {
                self.exhausted = true;
                return Err(e);
            }

            let page = self.next_page;
            self.next_page += 1;
            self.counters.pages_fetched += 1;
            debug!("Fetching page {} (size {})", page, self.page_size);

            match (self.fetch_page)(page, self.page_size).await {
                Ok(items) if items.is_empty() => {
                    debug!("Page {} is empty, listing complete", page);
                    self.exhausted = true;
                }
                Ok(items) => {
                    self.buffered.extend(items);
                }
                Err(e) if e.is_cancelled() => {
                    self.exhausted = true;
                    return Err(e);
                }
                Err(e) => {
                    self.exhausted = true;
                    self.counters.pages_failed += 1;

                    if page > 1 || self.policy.tolerate_first_page_failure {
                        warn!("Page {} failed, ending listing early: {}", page, e);
                        self.counters.pages_swallowed += 1;
                        if page == 1 {
                            self.counters.first_page_swallowed = true;
                        }
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Drain the remaining items into a vector
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}
