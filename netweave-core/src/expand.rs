use crate::attributes;
use crate::graph::{GraphAssembler, VertexHandle};
use crate::model::{ExpansionLevel, ProgressCallback, RequestStatistics, VertexPolicy};
use crate::visited::VisitedSet;
use netweave_scanner::error::Result;
use netweave_scanner::{
    CancelFlag, Entity, NetworkSource, RelationKind, RelationshipFetcher, RelationshipRecord,
    ServiceError,
};
use tracing::{debug, info, warn};

/// A relation kind whose expansion from the root ended with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindFailure {
    pub kind: RelationKind,
    pub error: ServiceError,
}

/// State left behind by one expander run
#[derive(Debug)]
pub struct Expansion {
    pub visited: VisitedSet,
    pub statistics: RequestStatistics,
    pub failures: Vec<KindFailure>,
    /// A first page failed after earlier results existed and was skipped
    pub absorbed_first_page: bool,
}

/// Walks the relationship network outward from a resolved root and writes
/// what it finds into a graph, bounded by an [`ExpansionLevel`].
///
/// All relation kinds share one visited set, so an entity reached through
/// several kinds or paths gets exactly one vertex.
pub struct NetworkExpander<'a, G: GraphAssembler + ?Sized> {
    source: &'a dyn NetworkSource,
    graph: &'a mut G,
    level: ExpansionLevel,
    max_per_request: Option<usize>,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
    visited: VisitedSet,
    statistics: RequestStatistics,
    failures: Vec<KindFailure>,
    absorbed_first_page: bool,
}

impl<'a, G: GraphAssembler + ?Sized> NetworkExpander<'a, G> {
    pub fn new(
        source: &'a dyn NetworkSource,
        graph: &'a mut G,
        level: ExpansionLevel,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            source,
            graph,
            level,
            max_per_request: None,
            cancel,
            progress: None,
            visited: VisitedSet::new(),
            statistics: RequestStatistics::default(),
            failures: Vec::new(),
            absorbed_first_page: false,
        }
    }

    pub fn with_max_per_request(mut self, max_per_request: Option<usize>) -> Self {
        self.max_per_request = max_per_request;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }


    /// Expand every kind in `kinds` from `root`, in the given order.
    ///
    /// A kind that fails is recorded and the next one still runs. Only
    /// cancellation is returned as an error.
    pub async fn expand_network(&mut self, root: &Entity, kinds: &[RelationKind]) -> Result<()> {
        for &kind in kinds {
            self.cancel.check()?;

            match self.expand_kind(root, kind).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("Expanding {}s of {} failed: {}", kind, root.handle, e);
                    self.failures.push(KindFailure { kind, error: e });
                }
            }
        }

        info!(
            "Expansion of {} done: {} entities, {} pages fetched",
            root.handle,
            self.visited.len(),
            self.statistics.pages_fetched
        );
        Ok(())
    }

    /// Depth-first over the recurse lists, starting with the root at level 1.
    ///
    /// Steps below the root only run once the visited set holds vertices, so
    /// their listings tolerate a failed first page. Such a failure ends that
    /// branch alone and is reported as an absorbed page.
    async fn expand_kind(&mut self, root: &Entity, kind: RelationKind) -> Result<()> {
        let mut pending = vec![(root.clone(), 1u8)];

        while let Some((entity, depth)) = pending.pop() {
            let next = self.expand_entity(&entity, kind, depth).await?;
            pending.extend(next.into_iter().rev().map(|e| (e, depth + 1)));
        }

        Ok(())
    }

    /// One traversal step. Returns the entities to recurse into.
    async fn expand_entity(
        &mut self,
        entity: &Entity,
        kind: RelationKind,
        depth: u8,
    ) -> Result<Vec<Entity>> {
        let step = self.level.step(depth);
        self.report(format!("Getting {}s of {}.", kind, entity.handle));

        let fetcher = RelationshipFetcher::new(self.source, self.cancel.clone())
            .with_max_per_request(self.max_per_request);
        let mut stream = fetcher.open(&entity.id, kind, !self.visited.is_empty());

        let mut discovered = Vec::new();
        let enumerated = loop {
            match stream.next().await {
                Ok(Some(record)) => {
                    if let Some(other) = self.take_record(entity, kind, step.vertices, record) {
                        discovered.push(other);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let counters = stream.counters();
        self.statistics.absorb(&counters);
        if counters.pages.first_page_swallowed {
            self.absorbed_first_page = true;
        }
        enumerated?;

        debug!(
            "{} new entities from {}s of {} at level {}",
            discovered.len(),
            kind,
            entity.handle,
            depth
        );

        if step.recurse {
            Ok(discovered)
        } else {
            Ok(Vec::new())
        }
    }

    /// Apply the step's vertex policy to one record. Returns the other
    /// entity if it was newly appended.
    fn take_record(
        &mut self,
        entity: &Entity,
        kind: RelationKind,
        policy: VertexPolicy,
        record: RelationshipRecord,
    ) -> Option<Entity> {
        match policy {
            VertexPolicy::Append => {
                let (own, _) = self.visited.append(&mut *self.graph, entity);
                let (other, appended) = self.visited.append(&mut *self.graph, &record.other);
                self.append_edge(own, other, kind, &record);
                appended.then_some(record.other)
            }
            VertexPolicy::ExistingOnly => {
                let own = self.visited.get(&entity.id)?;
                let other = self.visited.get(&record.other.id)?;
                self.append_edge(own, other, kind, &record);
                None
            }
        }
    }

    fn append_edge(
        &mut self,
        own: VertexHandle,
        other: VertexHandle,
        kind: RelationKind,
        record: &RelationshipRecord,
    ) {
        let (source, target) = if kind.points_to_root() {
            (other, own)
        } else {
            (own, other)
        };
        let edge = self.graph.append_edge(source, target, kind);

        if let Some(timestamp) = record.timestamp {
            self.graph
                .set_attribute(edge.into(), attributes::TIMESTAMP, &timestamp.to_rfc3339());
        }
        if let Some(url) = &record.reference_url {
            self.graph
                .set_attribute(edge.into(), attributes::REFERENCE_URL, url);
        }
    }

    fn report(&self, message: String) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    pub fn finish(self) -> Expansion {
        Expansion {
            visited: self.visited,
            statistics: self.statistics,
            failures: self.failures,
            absorbed_first_page: self.absorbed_first_page,
        }
    }
}
