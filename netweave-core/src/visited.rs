use crate::graph::{GraphAssembler, VertexHandle};
use netweave_scanner::Entity;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedEntry {
    pub entity: Entity,
    pub vertex: VertexHandle,
}

/// Entities already added to the graph during one crawl, in insertion order.
///
/// Holds exactly one entry per canonical id. Owned by a single expander.
#[derive(Debug, Default)]
pub struct VisitedSet {
    handles: HashMap<String, usize>,
    entries: Vec<VisitedEntry>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<VertexHandle> {
        self.handles.get(id).map(|&i| self.entries[i].vertex)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisitedEntry> {
        self.entries.iter()
    }

    /// Append a vertex for `entity` unless it is already visited.
    ///
    /// Returns the vertex and whether it was newly appended.
    pub fn append<G: GraphAssembler + ?Sized>(
        &mut self,
        graph: &mut G,
        entity: &Entity,
    ) -> (VertexHandle, bool) {
        if let Some(vertex) = self.get(&entity.id) {
            return (vertex, false);
        }

        let vertex = graph.append_vertex(&entity.id, &entity.handle);
        self.handles.insert(entity.id.clone(), self.entries.len());
        self.entries.push(VisitedEntry {
            entity: entity.clone(),
            vertex,
        });
        (vertex, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphDocument;

    #[test]
    fn test_append_is_idempotent() {
        let mut graph = GraphDocument::new();
        let mut visited = VisitedSet::new();
        let alice = Entity::new("1", "alice");

        let (first, appended) = visited.append(&mut graph, &alice);
        assert!(appended);
        let (second, appended) = visited.append(&mut graph, &alice);
        assert!(!appended);

        assert_eq!(first, second);
        assert_eq!(visited.len(), 1);
        assert_eq!(graph.vertex_count(), 1);
    }

    #[test]
    fn test_insertion_order() {
        let mut graph = GraphDocument::new();
        let mut visited = VisitedSet::new();
        for (id, handle) in [("3", "carol"), ("1", "alice"), ("2", "bob"), ("1", "alice")] {
            visited.append(&mut graph, &Entity::new(id, handle));
        }

        let ids: Vec<_> = visited.iter().map(|e| e.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }
}
