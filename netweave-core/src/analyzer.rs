use crate::enrich::AttributeEnricher;
use crate::error::{AnalyzerError, Result};
use crate::expand::{KindFailure, NetworkExpander};
use crate::graph::GraphDocument;
use crate::model::{NetworkRequest, Outcome, ProgressCallback, RequestStatistics};
use netweave_scanner::{CancelFlag, Entity, EntityResolver, NetworkSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Everything a finished crawl produced
#[derive(Debug)]
pub struct NetworkResult {
    /// The resolved root, if resolution succeeded
    pub root: Option<Entity>,
    pub graph: GraphDocument,
    pub statistics: RequestStatistics,
    /// Relation kinds whose expansion from the root ended with an error
    pub failures: Vec<KindFailure>,
    pub outcome: Outcome,
}

impl NetworkResult {
    fn empty(outcome: Outcome) -> Self {
        Self {
            root: None,
            graph: GraphDocument::new(),
            statistics: RequestStatistics::default(),
            failures: Vec::new(),
            outcome,
        }
    }
}

/// Messages from a spawned crawl, in the order the work happened
#[derive(Debug)]
pub enum AnalyzerEvent {
    Progress(String),
    /// Always the last event of a crawl, sent exactly once
    Completed(Box<NetworkResult>),
}

/// Handle to a crawl running on its own task
pub struct NetworkTask {
    pub events: mpsc::UnboundedReceiver<AnalyzerEvent>,
    pub cancel: CancelFlag,
    pub handle: JoinHandle<()>,
}

impl NetworkTask {
    /// Drain progress events into `on_progress` and return the final result
    pub async fn finish(mut self, mut on_progress: impl FnMut(String)) -> Option<NetworkResult> {
        while let Some(event) = self.events.recv().await {
            match event {
                AnalyzerEvent::Progress(message) => on_progress(message),
                AnalyzerEvent::Completed(result) => return Some(*result),
            }
        }
        None
    }
}

/// Releases the analyzer's busy flag on drop
struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AnalyzerError::Busy)?;
        Ok(Self { busy: busy.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs network crawls against one source, one at a time
pub struct NetworkAnalyzer {
    source: Arc<dyn NetworkSource>,
    busy: Arc<AtomicBool>,
}

impl NetworkAnalyzer {
    pub fn new(source: Arc<dyn NetworkSource>) -> Self {
        Self {
            source,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run a crawl on the current task. Fails fast with `Busy` while another
    /// crawl of this analyzer is running.
    pub async fn get_network(
        &self,
        request: &NetworkRequest,
        cancel: CancelFlag,
        progress: Option<ProgressCallback>,
    ) -> Result<NetworkResult> {
        request.validate()?;
        let _guard = BusyGuard::acquire(&self.busy)?;
        Ok(run_crawl(self.source.as_ref(), request, &cancel, progress).await)
    }

    /// Run a crawl on a new task and stream its progress
    pub fn spawn(&self, request: NetworkRequest) -> Result<NetworkTask> {
        request.validate()?;
        let guard = BusyGuard::acquire(&self.busy)?;

        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let source = self.source.clone();

        let progress_tx = tx.clone();
        let progress: ProgressCallback = Arc::new(move |message: String| {
            let _ = progress_tx.send(AnalyzerEvent::Progress(message));
        });

        let handle = tokio::spawn(async move {
            let worker = tokio::spawn(async move {
                run_crawl(source.as_ref(), &request, &worker_cancel, Some(progress)).await
            });

            let result = match worker.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Crawl task failed: {}", e);
                    NetworkResult::empty(Outcome::Failed(format!("Crawl task failed: {}", e)))
                }
            };

            // A consumer that sees Completed may start the next crawl right away
            drop(guard);
            let _ = tx.send(AnalyzerEvent::Completed(Box::new(result)));
        });

        Ok(NetworkTask {
            events,
            cancel,
            handle,
        })
    }
}

async fn run_crawl(
    source: &dyn NetworkSource,
    request: &NetworkRequest,
    cancel: &CancelFlag,
    progress: Option<ProgressCallback>,
) -> NetworkResult {
    if let Some(progress) = &progress {
        progress(format!("Looking up {}.", request.root_handle.trim()));
    }

    if cancel.is_cancelled() {
        return NetworkResult::empty(Outcome::Cancelled);
    }

    let root = match EntityResolver::new(source).resolve(&request.root_handle).await {
        Ok(root) => root,
        Err(e) if e.is_cancelled() => return NetworkResult::empty(Outcome::Cancelled),
        Err(e) => {
            error!("Could not resolve {}: {}", request.root_handle, e);
            return NetworkResult::empty(Outcome::Failed(e.to_string()));
        }
    };

    let mut graph = GraphDocument::new();
    let mut expander = NetworkExpander::new(source, &mut graph, request.level, cancel.clone())
        .with_max_per_request(request.max_per_request)
        .with_progress(progress.clone());
    let mut cancelled = expander
        .expand_network(&root, &request.kinds())
        .await
        .is_err();
    let expansion = expander.finish();
    let mut statistics = expansion.statistics;

    if !cancelled && request.enrich {
        let enricher = AttributeEnricher::new(source, cancel.clone()).with_progress(progress);
        cancelled = enricher
            .enrich(&expansion.visited, &mut graph, &mut statistics)
            .await
            .is_err();
    }

    let outcome = decide_outcome(
        cancelled || cancel.is_cancelled(),
        &expansion.failures,
        graph.vertex_count(),
        expansion.absorbed_first_page,
    );

    info!(
        "Crawl of {} finished ({}): {} vertices, {} edges",
        root.handle,
        outcome.as_str(),
        graph.vertex_count(),
        graph.edge_count()
    );

    NetworkResult {
        root: Some(root),
        graph,
        statistics,
        failures: expansion.failures,
        outcome,
    }
}

fn decide_outcome(
    cancelled: bool,
    failures: &[KindFailure],
    vertex_count: usize,
    absorbed_first_page: bool,
) -> Outcome {
    if cancelled {
        return Outcome::Cancelled;
    }

    if let Some(failure) = failures.first() {
        return if vertex_count == 0 {
            Outcome::Failed(failure.error.to_string())
        } else {
            Outcome::PartialSuccess
        };
    }

    if absorbed_first_page {
        Outcome::PartialSuccess
    } else {
        Outcome::Success
    }
}
