use crate::error::{AnalyzerError, Result};
use netweave_scanner::{FetchCounters, RelationKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback for reporting crawl progress
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// How far the network is expanded from the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpansionLevel {
    /// The root and its direct relations
    One,
    /// Level one, plus the relations among the root's direct relations
    OnePointFive,
    /// Level one, plus the direct relations of every direct relation
    Two,
}

/// Whether a traversal step may introduce vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexPolicy {
    /// Append vertices for newly met entities, and their edges
    Append,
    /// Append nothing new; keep an edge only if both ends are already visited
    ExistingOnly,
}

/// What one traversal step at a given recursion level is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub vertices: VertexPolicy,
    pub recurse: bool,
}

impl ExpansionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpansionLevel::One => "1",
            ExpansionLevel::OnePointFive => "1.5",
            ExpansionLevel::Two => "2",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "1.0" | "one" => Some(ExpansionLevel::One),
            "1.5" | "onepointfive" => Some(ExpansionLevel::OnePointFive),
            "2" | "2.0" | "two" => Some(ExpansionLevel::Two),
            _ => None,
        }
    }

    /// Policy for a step at `recursion_level` (1 for the root's own listing)
    pub fn step(&self, recursion_level: u8) -> StepPolicy {
        match (self, recursion_level) {
            (_, 0 | 1) => StepPolicy {
                vertices: VertexPolicy::Append,
                recurse: !matches!(self, ExpansionLevel::One),
            },
            (ExpansionLevel::Two, _) => StepPolicy {
                vertices: VertexPolicy::Append,
                recurse: false,
            },
            (ExpansionLevel::One | ExpansionLevel::OnePointFive, _) => StepPolicy {
                vertices: VertexPolicy::ExistingOnly,
                recurse: false,
            },
        }
    }
}

impl std::fmt::Display for ExpansionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counters for one crawl. Observability only, never used to steer traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatistics {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub pages_swallowed: usize,
    pub child_fetches: usize,
    pub child_fetches_failed: usize,
    pub vertices_enriched: usize,
    pub enrichment_failures: usize,
}

impl RequestStatistics {
    pub fn absorb(&mut self, counters: &FetchCounters) {
        self.pages_fetched += counters.pages.pages_fetched;
        self.pages_failed += counters.pages.pages_failed;
        self.pages_swallowed += counters.pages.pages_swallowed;
        self.child_fetches += counters.child_fetches;
        self.child_fetches_failed += counters.child_fetches_failed;
    }
}

/// Final status of a crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Some relation kind could not be fully expanded; the graph is usable but incomplete
    PartialSuccess,
    Cancelled,
    Failed(String),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::PartialSuccess => "partial_success",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Parameters of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub root_handle: String,
    pub relation_kinds: Vec<RelationKind>,
    pub level: ExpansionLevel,
    /// Item cap per listing. `None` means unlimited.
    pub max_per_request: Option<usize>,
    pub enrich: bool,
}

impl NetworkRequest {
    pub fn new(root_handle: impl Into<String>, level: ExpansionLevel) -> Self {
        Self {
            root_handle: root_handle.into(),
            relation_kinds: RelationKind::ALL.to_vec(),
            level,
            max_per_request: None,
            enrich: true,
        }
    }

    pub fn with_relation_kinds(mut self, kinds: Vec<RelationKind>) -> Self {
        self.relation_kinds = kinds;
        self
    }

    pub fn with_max_per_request(mut self, max_per_request: Option<usize>) -> Self {
        self.max_per_request = max_per_request;
        self
    }

    pub fn with_enrichment(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    /// Requested kinds in processing order, without duplicates
    pub fn kinds(&self) -> Vec<RelationKind> {
        let mut kinds = self.relation_kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_handle.trim().is_empty() {
            return Err(AnalyzerError::InvalidRequest(
                "root handle must not be empty".to_string(),
            ));
        }
        if self.relation_kinds.is_empty() {
            return Err(AnalyzerError::InvalidRequest(
                "at least one relation kind is required".to_string(),
            ));
        }
        if self.max_per_request == Some(0) {
            return Err(AnalyzerError::InvalidRequest(
                "max per request must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
