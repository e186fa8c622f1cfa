pub mod cancel;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod model;
pub mod pager;
pub mod resolver;
pub mod source;

pub use cancel::CancelFlag;
pub use error::ServiceError;
pub use fetcher::{FetchCounters, RelationshipFetcher, RelationshipStream};
pub use http::HttpSource;
pub use model::{Entity, EntityDetails, ParentItem, RelationKind, RelationshipRecord};
pub use pager::{PageCounters, PageEnumerator, PagePolicy};
pub use resolver::EntityResolver;
pub use source::{Listing, NetworkSource};
