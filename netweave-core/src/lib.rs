pub mod analyzer;
pub mod attributes;
pub mod data;
pub mod enrich;
pub mod error;
pub mod expand;
pub mod graph;
pub mod model;
pub mod report;
pub mod visited;

pub use analyzer::{AnalyzerEvent, NetworkAnalyzer, NetworkResult, NetworkTask};
pub use error::AnalyzerError;
pub use graph::{GraphAssembler, GraphDocument};
pub use model::{ExpansionLevel, NetworkRequest, Outcome, ProgressCallback, RequestStatistics};

pub use netweave_scanner::{CancelFlag, Entity, RelationKind, ServiceError};
