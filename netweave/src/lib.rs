// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{build_request, parse_level, parse_relation_kinds, resolve_path};
