// Tests for network expansion, enrichment and crawl outcomes

mod common;

use common::{ScriptedSource, comment_time, id_of};
use netweave_core::analyzer::AnalyzerEvent;
use netweave_core::attributes;
use netweave_core::{
    AnalyzerError, CancelFlag, ExpansionLevel, NetworkAnalyzer, NetworkRequest, NetworkResult,
    Outcome, RelationKind,
};
use netweave_scanner::NetworkSource;
use std::sync::{Arc, Mutex};

fn contacts_only(root: &str, level: ExpansionLevel) -> NetworkRequest {
    NetworkRequest::new(root, level)
        .with_relation_kinds(vec![RelationKind::Contact])
        .with_enrichment(false)
}

async fn crawl(source: &Arc<ScriptedSource>, request: &NetworkRequest) -> NetworkResult {
    let dyn_source: Arc<dyn NetworkSource> = source.clone();
    NetworkAnalyzer::new(dyn_source)
        .get_network(request, CancelFlag::new(), None)
        .await
        .unwrap()
}

fn commenters_only(root: &str, level: ExpansionLevel) -> NetworkRequest {
    NetworkRequest::new(root, level)
        .with_relation_kinds(vec![RelationKind::Commenter])
        .with_enrichment(false)
}

fn vertex_ids(result: &NetworkResult) -> Vec<String> {
    let mut ids: Vec<String> = result.graph.vertices().map(|v| v.id.clone()).collect();
    ids.sort();
    ids
}

fn ids(handles: &[&str]) -> Vec<String> {
    let mut ids: Vec<String> = handles.iter().map(|h| id_of(h)).collect();
    ids.sort();
    ids
}

/// alice -> [bob, carol], bob -> [carol], carol -> [dave]
fn small_world() -> ScriptedSource {
    ScriptedSource::new()
        .contacts("alice", &["bob", "carol"])
        .contacts("bob", &["carol"])
        .contacts("carol", &["dave"])
}

// ============================================================================
// Expansion Level Tests
// ============================================================================

#[tokio::test]
async fn test_level_one_adds_direct_contacts_only() {
    let source = Arc::new(small_world());
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "carol"]));
    assert_eq!(result.graph.edge_count(), 2);
    assert!(result.graph.has_edge(&id_of("alice"), &id_of("bob"), RelationKind::Contact));
    assert!(result.graph.has_edge(&id_of("alice"), &id_of("carol"), RelationKind::Contact));

    // No recursive calls: only alice's listing was requested
    let requested: Vec<String> = source
        .contact_page_requests()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert!(requested.iter().all(|id| *id == id_of("alice")));
}

#[tokio::test]
async fn test_level_one_and_a_half_links_existing_vertices_only() {
    let source = Arc::new(small_world());
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::OnePointFive)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "carol"]));
    assert_eq!(result.graph.edge_count(), 3);
    assert!(result.graph.has_edge(&id_of("bob"), &id_of("carol"), RelationKind::Contact));
    assert!(result.graph.vertex(&id_of("dave")).is_none());
    assert!(!source
        .contact_page_requests()
        .iter()
        .any(|(id, _)| *id == id_of("dave")));
}

#[tokio::test]
async fn test_level_two_adds_second_degree_without_further_recursion() {
    let source = Arc::new(small_world().contacts("dave", &["erin"]));
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::Two)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "carol", "dave"]));
    assert!(result.graph.has_edge(&id_of("carol"), &id_of("dave"), RelationKind::Contact));
    assert!(result.graph.vertex(&id_of("erin")).is_none());
    assert!(!source
        .contact_page_requests()
        .iter()
        .any(|(id, _)| *id == id_of("dave")));
}

#[tokio::test]
async fn test_root_without_relations_has_no_vertex() {
    let source = Arc::new(ScriptedSource::new().user("hermit"));
    let result = crawl(&source, &contacts_only("hermit", ExpansionLevel::Two)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.graph.vertex_count(), 0);
    assert_eq!(result.root.unwrap().id, id_of("hermit"));
}

#[tokio::test]
async fn test_resolves_handle_case_insensitively() {
    let source = Arc::new(small_world());
    let result = crawl(&source, &contacts_only("ALICE", ExpansionLevel::One)).await;

    let root = result.root.unwrap();
    assert_eq!(root.handle, "alice");
    assert_eq!(result.graph.vertex(&id_of("alice")).unwrap().label, "alice");
}

// ============================================================================
// Deduplication Tests
// ============================================================================

#[tokio::test]
async fn test_self_relationship_adds_self_loop_without_new_vertex() {
    let source = Arc::new(ScriptedSource::new().contacts("alice", &["alice", "bob"]));
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    assert_eq!(vertex_ids(&result), ids(&["alice", "bob"]));
    assert!(result.graph.has_edge(&id_of("alice"), &id_of("alice"), RelationKind::Contact));
    assert_eq!(result.graph.edge_count(), 2);
}

#[tokio::test]
async fn test_cycles_do_not_duplicate_vertices() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["bob", "carol"])
            .contacts("bob", &["alice", "carol"])
            .contacts("carol", &["bob", "alice"]),
    );
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::Two)).await;

    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "carol"]));
    assert_eq!(result.graph.edge_count(), 6);
}

#[tokio::test]
async fn test_relation_kinds_share_one_visited_set() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["bob"])
            .photo("alice", "p1", &["bob", "erin"]),
    );
    let request = NetworkRequest::new("alice", ExpansionLevel::One).with_enrichment(false);
    let result = crawl(&source, &request).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "erin"]));
    assert!(result.graph.has_edge(&id_of("alice"), &id_of("bob"), RelationKind::Contact));
    assert!(result.graph.has_edge(&id_of("bob"), &id_of("alice"), RelationKind::Commenter));
    assert!(result.graph.has_edge(&id_of("erin"), &id_of("alice"), RelationKind::Commenter));
    // The contact kind ran first and appended bob
    let first: Vec<&str> = result.graph.vertices().map(|v| v.label.as_str()).collect();
    assert_eq!(first, vec!["alice", "bob", "erin"]);
}

#[tokio::test]
async fn test_duplicate_kinds_are_processed_once() {
    let source = Arc::new(small_world());
    let request = contacts_only("alice", ExpansionLevel::One)
        .with_relation_kinds(vec![RelationKind::Contact, RelationKind::Contact]);
    let result = crawl(&source, &request).await;

    assert_eq!(result.graph.edge_count(), 2);
    assert_eq!(result.statistics.pages_fetched, 2);
}

// ============================================================================
// Commenter Tests
// ============================================================================

#[tokio::test]
async fn test_commenter_edges_point_to_root_with_attributes() {
    let source = Arc::new(
        ScriptedSource::new()
            .photo("alice", "p1", &["bob"])
            .photo("alice", "p2", &["carol", "bob"]),
    );
    let request = NetworkRequest::new("alice", ExpansionLevel::One)
        .with_relation_kinds(vec![RelationKind::Commenter])
        .with_enrichment(false);
    let result = crawl(&source, &request).await;

    assert_eq!(vertex_ids(&result), ids(&["alice", "bob", "carol"]));
    let edges = result
        .graph
        .edges_between(&id_of("bob"), &id_of("alice"), RelationKind::Commenter);
    // One edge per comment
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.attributes.contains_key(attributes::TIMESTAMP)));
    let on_p1 = edges
        .iter()
        .find(|e| e.attributes[attributes::REFERENCE_URL].contains("/p1#"))
        .unwrap();
    assert_eq!(
        on_p1.attributes[attributes::TIMESTAMP],
        comment_time(0).to_rfc3339()
    );
    assert_eq!(result.statistics.child_fetches, 2);
}

#[tokio::test]
async fn test_contact_edges_have_no_attributes() {
    let source = Arc::new(small_world());
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    let edges = result
        .graph
        .edges_between(&id_of("alice"), &id_of("bob"), RelationKind::Contact);
    assert!(edges[0].attributes.is_empty());
}

// ============================================================================
// Pagination And Failure Tests
// ============================================================================

#[tokio::test]
async fn test_first_page_failure_without_results_fails() {
    let source = Arc::new(small_world().fail_contact_page("alice", 1));
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    assert!(
        matches!(result.outcome, Outcome::Failed(ref m) if m.contains("Insufficient permissions"))
    );
    assert_eq!(result.graph.vertex_count(), 0);
    assert_eq!(result.statistics.pages_fetched, 1);
    assert_eq!(result.statistics.pages_failed, 1);
    assert_eq!(result.failures.len(), 1);
}

#[tokio::test]
async fn test_later_page_failure_keeps_earlier_pages() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["b1", "b2", "b3", "b4", "b5", "b6"])
            .page_limit(2)
            .fail_contact_page("alice", 3),
    );
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "b1", "b2", "b3", "b4"]));
    assert_eq!(result.statistics.pages_fetched, 3);
    assert_eq!(result.statistics.pages_failed, 1);
    assert_eq!(result.statistics.pages_swallowed, 1);
}

#[tokio::test]
async fn test_pages_fetched_is_exact() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["b1", "b2", "b3", "b4", "b5"])
            .page_limit(2),
    );
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::One)).await;

    // 2 + 2 + 1, then an empty page
    assert_eq!(result.statistics.pages_fetched, 4);
    assert_eq!(source.contact_page_requests().len(), 4);
}

#[tokio::test]
async fn test_max_per_request_caps_each_listing() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["b1", "b2", "b3", "b4", "b5"])
            .page_limit(2),
    );
    let request = contacts_only("alice", ExpansionLevel::One).with_max_per_request(Some(3));
    let result = crawl(&source, &request).await;

    assert_eq!(result.graph.vertex_count(), 4);
    assert_eq!(result.statistics.pages_fetched, 2);
}

#[tokio::test]
async fn test_second_level_failure_only_ends_that_branch() {
    let source = Arc::new(
        small_world()
            .contacts("bob", &["frank"])
            .fail_contact_page("bob", 2)
            .page_limit(1),
    );
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::Two)).await;

    // bob's first page (carol) arrived before the failure; carol's branch ran
    assert_eq!(result.outcome, Outcome::Success);
    assert!(result.graph.vertex(&id_of("dave")).is_some());
    assert!(result.graph.vertex(&id_of("frank")).is_none());
    assert_eq!(result.statistics.pages_swallowed, 1);
}

#[tokio::test]
async fn test_absorbed_first_page_failure_is_partial_success() {
    let source = Arc::new(small_world().fail_contact_page("bob", 1));
    let result = crawl(&source, &contacts_only("alice", ExpansionLevel::Two)).await;

    assert_eq!(result.outcome, Outcome::PartialSuccess);
    assert!(result.graph.vertex(&id_of("dave")).is_some());
    assert_eq!(result.statistics.pages_swallowed, 1);
}

#[tokio::test]
async fn test_photo_listing_failure_without_results_fails() {
    let source = Arc::new(
        ScriptedSource::new()
            .photo("alice", "p1", &["bob"])
            .fail_photo_page("alice", 1),
    );
    let result = crawl(&source, &commenters_only("alice", ExpansionLevel::One)).await;

    assert!(
        matches!(result.outcome, Outcome::Failed(ref m) if m.contains("Insufficient permissions"))
    );
    assert_eq!(result.graph.vertex_count(), 0);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].kind, RelationKind::Commenter);
    assert_eq!(source.comment_requests(), 0);
    assert_eq!(result.statistics.pages_failed, 1);
    assert_eq!(result.statistics.pages_swallowed, 0);
}

#[tokio::test]
async fn test_photo_listing_failure_after_contacts_is_absorbed() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["bob"])
            .photo("alice", "p1", &["carol"])
            .fail_photo_page("alice", 1),
    );
    let request = NetworkRequest::new("alice", ExpansionLevel::One).with_enrichment(false);
    let result = crawl(&source, &request).await;

    assert_eq!(result.outcome, Outcome::PartialSuccess);
    assert!(result.failures.is_empty());
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob"]));
    assert_eq!(result.statistics.pages_swallowed, 1);
    assert_eq!(source.photo_page_requests(), vec![(id_of("alice"), 1)]);
    assert_eq!(source.comment_requests(), 0);
}

#[tokio::test]
async fn test_later_photo_page_failure_keeps_earlier_photos() {
    let source = Arc::new(
        ScriptedSource::new()
            .photo("alice", "p1", &["bob"])
            .photo("alice", "p2", &["carol"])
            .page_limit(1)
            .fail_photo_page("alice", 2),
    );
    let result = crawl(&source, &commenters_only("alice", ExpansionLevel::One)).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(vertex_ids(&result), ids(&["alice", "bob"]));
    assert!(result.graph.has_edge(&id_of("bob"), &id_of("alice"), RelationKind::Commenter));
    assert_eq!(result.statistics.pages_fetched, 2);
    assert_eq!(result.statistics.pages_swallowed, 1);
    assert_eq!(source.comment_requests(), 1);
}

#[tokio::test]
async fn test_failing_kind_does_not_stop_other_kinds() {
    let source = Arc::new(
        ScriptedSource::new()
            .contacts("alice", &["bob"])
            .fail_contact_page("alice", 1)
            .photo("alice", "p1", &["carol"]),
    );
    let request = NetworkRequest::new("alice", ExpansionLevel::One).with_enrichment(false);
    let result = crawl(&source, &request).await;

    assert_eq!(result.outcome, Outcome::PartialSuccess);
    assert_eq!(vertex_ids(&result), ids(&["alice", "carol"]));
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].kind, RelationKind::Contact);
}

#[tokio::test]
async fn test_unknown_root_fails_before_traversal() {
    let source = Arc::new(small_world());
    let result = crawl(&source, &contacts_only("nobody", ExpansionLevel::Two)).await;

    assert!(matches!(result.outcome, Outcome::Failed(ref m) if m.contains("nobody")));
    assert!(result.root.is_none());
    assert!(source.contact_page_requests().is_empty());
}

// ============================================================================
// Enrichment Tests
// ============================================================================

#[tokio::test]
async fn test_enrichment_sets_detail_attributes() {
    let source = Arc::new(small_world());
    let request = contacts_only("alice", ExpansionLevel::One).with_enrichment(true);
    let result = crawl(&source, &request).await;

    assert_eq!(result.statistics.vertices_enriched, 3);
    let bob = result.graph.vertex(&id_of("bob")).unwrap();
    assert_eq!(bob.attributes[attributes::REAL_NAME], "bob Example");
    assert_eq!(bob.attributes[attributes::PHOTO_COUNT], "3");
    assert!(!bob.attributes.contains_key(attributes::IMAGE_URL));
    // Visit order
    assert_eq!(
        source.details_requests(),
        vec![id_of("alice"), id_of("bob"), id_of("carol")]
    );
}

#[tokio::test]
async fn test_enrichment_failure_is_isolated() {
    let source = Arc::new(small_world().fail_details("bob"));
    let request = contacts_only("alice", ExpansionLevel::One).with_enrichment(true);
    let result = crawl(&source, &request).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.statistics.vertices_enriched, 2);
    assert_eq!(result.statistics.enrichment_failures, 1);
    assert!(result.graph.vertex(&id_of("bob")).unwrap().attributes.is_empty());
    assert!(!result.graph.vertex(&id_of("carol")).unwrap().attributes.is_empty());
}

#[tokio::test]
async fn test_cancel_during_enrichment() {
    let cancel = CancelFlag::new();
    let source = Arc::new(small_world().cancel_on_details(2, cancel.clone()));
    let dyn_source: Arc<dyn NetworkSource> = source.clone();
    let request = contacts_only("alice", ExpansionLevel::One).with_enrichment(true);

    let result = NetworkAnalyzer::new(dyn_source)
        .get_network(&request, cancel, None)
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Cancelled);
    assert_eq!(result.graph.vertex_count(), 3);
    assert_eq!(result.graph.edge_count(), 2);
    assert!(!result.graph.vertex(&id_of("alice")).unwrap().attributes.is_empty());
    // Details that arrived after the cancel were dropped
    assert!(result.graph.vertex(&id_of("bob")).unwrap().attributes.is_empty());
    assert!(result.graph.vertex(&id_of("carol")).unwrap().attributes.is_empty());
    assert_eq!(source.details_requests().len(), 2);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let source = Arc::new(small_world());
    let dyn_source: Arc<dyn NetworkSource> = source.clone();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = NetworkAnalyzer::new(dyn_source)
        .get_network(&contacts_only("alice", ExpansionLevel::Two), cancel, None)
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Cancelled);
    assert!(source.contact_page_requests().is_empty());
}

// ============================================================================
// Analyzer Tests
// ============================================================================

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let source: Arc<dyn NetworkSource> = Arc::new(small_world());
    let analyzer = NetworkAnalyzer::new(source);
    let request = contacts_only("alice", ExpansionLevel::One).with_relation_kinds(vec![]);

    let err = analyzer
        .get_network(&request, CancelFlag::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidRequest(_)));
    assert!(!analyzer.is_busy());
}

#[tokio::test]
async fn test_second_crawl_is_rejected_while_busy() {
    let source: Arc<dyn NetworkSource> = Arc::new(small_world());
    let analyzer = NetworkAnalyzer::new(source);

    let task = analyzer
        .spawn(contacts_only("alice", ExpansionLevel::One))
        .unwrap();
    assert!(analyzer.is_busy());

    let err = analyzer
        .get_network(&contacts_only("bob", ExpansionLevel::One), CancelFlag::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::Busy));
    assert!(matches!(
        analyzer.spawn(contacts_only("bob", ExpansionLevel::One)),
        Err(AnalyzerError::Busy)
    ));

    let result = task.finish(|_| {}).await.unwrap();
    assert_eq!(result.outcome, Outcome::Success);

    // Free again once the first crawl has completed
    assert!(!analyzer.is_busy());
    let second = analyzer
        .get_network(&contacts_only("bob", ExpansionLevel::One), CancelFlag::new(), None)
        .await
        .unwrap();
    assert_eq!(second.graph.vertex_count(), 2);
}

#[tokio::test]
async fn test_spawned_crawl_streams_progress_then_completes_once() {
    let source: Arc<dyn NetworkSource> = Arc::new(small_world());
    let analyzer = NetworkAnalyzer::new(source);
    let request = contacts_only("alice", ExpansionLevel::OnePointFive).with_enrichment(true);

    let mut task = analyzer.spawn(request).unwrap();
    let mut events = Vec::new();
    while let Some(event) = task.events.recv().await {
        events.push(event);
    }

    let completed = events
        .iter()
        .filter(|e| matches!(e, AnalyzerEvent::Completed(_)))
        .count();
    assert_eq!(completed, 1);
    assert!(matches!(events.last(), Some(AnalyzerEvent::Completed(_))));

    let messages: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AnalyzerEvent::Progress(m) => Some(m.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        messages,
        vec![
            "Looking up alice.",
            "Getting contacts of alice.",
            "Getting contacts of bob.",
            "Getting contacts of carol.",
            "Getting information about alice (1/3).",
            "Getting information about bob (2/3).",
            "Getting information about carol (3/3).",
        ]
    );
}

#[tokio::test]
async fn test_spawned_crawl_can_be_cancelled() {
    let source: Arc<dyn NetworkSource> = Arc::new(small_world());
    let analyzer = NetworkAnalyzer::new(source);

    let task = analyzer
        .spawn(contacts_only("alice", ExpansionLevel::Two))
        .unwrap();
    task.cancel.cancel();

    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let result = task
        .finish(move |m| seen.lock().unwrap().push(m))
        .await
        .unwrap();

    assert_eq!(result.outcome, Outcome::Cancelled);
    assert_eq!(*progress.lock().unwrap(), vec!["Looking up alice.".to_string()]);
}
