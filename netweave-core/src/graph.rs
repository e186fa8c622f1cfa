use netweave_scanner::RelationKind;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type VertexHandle = NodeIndex;
pub type EdgeHandle = EdgeIndex;

/// Target of a `set_attribute` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementHandle {
    Vertex(VertexHandle),
    Edge(EdgeHandle),
}

impl From<VertexHandle> for ElementHandle {
    fn from(handle: VertexHandle) -> Self {
        ElementHandle::Vertex(handle)
    }
}

impl From<EdgeHandle> for ElementHandle {
    fn from(handle: EdgeHandle) -> Self {
        ElementHandle::Edge(handle)
    }
}

/// Sink the expander and enricher write the network into.
///
/// `append_vertex` is never called twice for one id within a crawl.
pub trait GraphAssembler: Send {
    fn append_vertex(&mut self, id: &str, label: &str) -> VertexHandle;
    fn append_edge(
        &mut self,
        source: VertexHandle,
        target: VertexHandle,
        kind: RelationKind,
    ) -> EdgeHandle;
    fn set_attribute(&mut self, element: ElementHandle, key: &str, value: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub id: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub kind: RelationKind,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation_kind: RelationKind,
    pub attributes: BTreeMap<String, String>,
}

/// Flat, owned view of a graph document, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// In-memory graph document
#[derive(Debug, Clone, Default)]
pub struct GraphDocument {
    graph: DiGraph<Vertex, Edge>,
    by_id: HashMap<String, VertexHandle>,
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_weights()
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.by_id.get(id).map(|&handle| &self.graph[handle])
    }

    pub fn edge_count_by_kind(&self, kind: RelationKind) -> usize {
        self.graph.edge_weights().filter(|e| e.kind == kind).count()
    }

    /// Edges from `source_id` to `target_id` of the given kind
    pub fn edges_between(
        &self,
        source_id: &str,
        target_id: &str,
        kind: RelationKind,
    ) -> Vec<&Edge> {
        let (Some(&source), Some(&target)) = (self.by_id.get(source_id), self.by_id.get(target_id))
        else {
            return Vec::new();
        };

        self.graph
            .edges_connecting(source, target)
            .filter(|e| e.weight().kind == kind)
            .map(|e| e.weight())
            .collect()
    }

    pub fn has_edge(&self, source_id: &str, target_id: &str, kind: RelationKind) -> bool {
        !self.edges_between(source_id, target_id, kind).is_empty()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let vertices = self
            .graph
            .node_weights()
            .map(|v| VertexRecord {
                id: v.id.clone(),
                label: v.label.clone(),
                attributes: v.attributes.clone(),
            })
            .collect();

        let edges = self
            .graph
            .edge_references()
            .map(|e| EdgeRecord {
                source: self.graph[e.source()].id.clone(),
                target: self.graph[e.target()].id.clone(),
                relation_kind: e.weight().kind,
                attributes: e.weight().attributes.clone(),
            })
            .collect();

        GraphSnapshot { vertices, edges }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl GraphAssembler for GraphDocument {
    fn append_vertex(&mut self, id: &str, label: &str) -> VertexHandle {
        if let Some(&handle) = self.by_id.get(id) {
            return handle;
        }

        let handle = self.graph.add_node(Vertex {
            id: id.to_string(),
            label: label.to_string(),
            attributes: BTreeMap::new(),
        });
        self.by_id.insert(id.to_string(), handle);
        handle
    }

    fn append_edge(
        &mut self,
        source: VertexHandle,
        target: VertexHandle,
        kind: RelationKind,
    ) -> EdgeHandle {
        self.graph.add_edge(
            source,
            target,
            Edge {
                kind,
                attributes: BTreeMap::new(),
            },
        )
    }

    fn set_attribute(&mut self, element: ElementHandle, key: &str, value: &str) {
        let attributes = match element {
            ElementHandle::Vertex(handle) => {
                self.graph.node_weight_mut(handle).map(|v| &mut v.attributes)
            }
            ElementHandle::Edge(handle) => {
                self.graph.edge_weight_mut(handle).map(|e| &mut e.attributes)
            }
        };

        if let Some(attributes) = attributes {
            attributes.insert(key.to_string(), value.to_string());
        }
    }
}
