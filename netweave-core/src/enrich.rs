use crate::attributes::detail_attributes;
use crate::graph::GraphAssembler;
use crate::model::{ProgressCallback, RequestStatistics};
use crate::visited::VisitedSet;
use netweave_scanner::error::Result;
use netweave_scanner::{CancelFlag, NetworkSource};
use tracing::{debug, warn};

/// Fetches detail attributes for every visited entity and writes them onto
/// its vertex. One entity failing never stops the others.
pub struct AttributeEnricher<'a> {
    source: &'a dyn NetworkSource,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
}

impl<'a> AttributeEnricher<'a> {
    pub fn new(source: &'a dyn NetworkSource, cancel: CancelFlag) -> Self {
        Self {
            source,
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Enrich in visit order. Only cancellation is returned as an error.
    pub async fn enrich<G: GraphAssembler + ?Sized>(
        &self,
        visited: &VisitedSet,
        graph: &mut G,
        statistics: &mut RequestStatistics,
    ) -> Result<()> {
        let total = visited.len();

        for (i, entry) in visited.iter().enumerate() {
            self.cancel.check()?;

            if let Some(progress) = &self.progress {
                progress(format!(
                    "Getting information about {} ({}/{}).",
                    entry.entity.handle,
                    i + 1,
                    total
                ));
            }

            match self.source.entity_details(&entry.entity.id).await {
                Ok(details) => {
                    // Details that arrive after a cancel are dropped
                    self.cancel.check()?;

                    for (key, value) in detail_attributes(&details) {
                        graph.set_attribute(entry.vertex.into(), key, &value);
                    }
                    statistics.vertices_enriched += 1;
                    debug!("Enriched {}", entry.entity.handle);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    statistics.enrichment_failures += 1;
                    warn!("Could not get details for {}: {}", entry.entity.handle, e);
                }
            }
        }

        Ok(())
    }
}
