// Report generation from database

use crate::analyzer::NetworkResult;
use crate::attributes::{LOCATION, REAL_NAME, VERTEX_KEYS};
use crate::data::{Database, StoredVertex};
use crate::model::RequestStatistics;
use netweave_scanner::RelationKind;
use rusqlite::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

const TOP_VERTICES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub status: String,
    pub root_handle: String,
    pub level: String,
    pub relation_kinds: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexDegree {
    pub label: String,
    pub degree: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub session_id: String,
    pub session: SessionInfo,
    pub total_vertices: usize,
    pub total_edges: i64,
    pub edges_by_kind: Vec<(String, i64)>,
    pub statistics: RequestStatistics,
    pub top_vertices: Vec<VertexDegree>,
    /// How many vertices carry each detail attribute, in attribute key order
    pub attribute_coverage: Vec<(String, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<StoredVertex>>,
}

pub fn gather_report_data(
    db: &Database,
    session_id: &str,
    include_vertices: bool,
) -> Result<ReportData> {
    let record = db
        .get_session(session_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;

    let session = SessionInfo {
        start_time: record.start_time,
        end_time: record.end_time,
        status: record.status,
        root_handle: record.root_handle,
        level: record.level,
        relation_kinds: serde_json::from_str(&record.relation_kinds).unwrap_or_default(),
        message: record.message,
    };

    let vertices = db.get_vertices(session_id)?;
    let edges_by_kind = db.get_edge_counts_by_kind(session_id)?;
    let total_edges = edges_by_kind.iter().map(|(_, count)| count).sum();

    let top_vertices = db
        .get_top_vertices_by_degree(session_id, TOP_VERTICES)?
        .into_iter()
        .map(|(label, degree)| VertexDegree { label, degree })
        .collect();

    Ok(ReportData {
        session_id: session_id.to_string(),
        session,
        total_vertices: vertices.len(),
        total_edges,
        edges_by_kind,
        statistics: record.statistics.unwrap_or_default(),
        top_vertices,
        attribute_coverage: attribute_coverage(&vertices),
        vertices: include_vertices.then_some(vertices),
    })
}

fn attribute_coverage(vertices: &[StoredVertex]) -> Vec<(String, usize)> {
    VERTEX_KEYS
        .iter()
        .map(|key| {
            let count = vertices
                .iter()
                .filter(|v| v.attributes.contains_key(*key))
                .count();
            (key.to_string(), count)
        })
        .collect()
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          NETWEAVE NETWORK REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Session ID:   {}\n", data.session_id));
    report.push_str(&format!("Status:       {}\n", format_status(&data.session.status)));
    report.push_str(&format!("Crawl Date:   {}\n", format_timestamp(data.session.start_time)));

    if let Some(end_time) = data.session.end_time {
        let duration = end_time - data.session.start_time;
        report.push_str(&format!("Duration:     {} seconds\n", duration));
    }

    report.push_str(&format!("Root:         {}\n", data.session.root_handle));
    report.push_str(&format!("Level:        {}\n", data.session.level));
    report.push_str(&format!("Relations:    {}\n", data.session.relation_kinds.join(", ")));

    if let Some(ref message) = data.session.message {
        report.push_str("Message:\n");
        report.push_str(&wrap_text(message, 80, "  "));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("NETWORK SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Vertices:     {}\n", data.total_vertices));
    report.push_str(&format!("Edges:        {}\n", data.total_edges));
    for (kind, count) in &data.edges_by_kind {
        report.push_str(&format!("  [{}] {}\n", kind, count));
    }
    report.push('\n');

    if !data.top_vertices.is_empty() {
        report.push_str("Most connected:\n");
        for (idx, vertex) in data.top_vertices.iter().enumerate() {
            report.push_str(&format!("  {:>2}. {} ({})\n", idx + 1, vertex.label, vertex.degree));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("REQUESTS\n");
    report.push_str(RULE);
    report.push('\n');

    let stats = &data.statistics;
    report.push_str(&format!("Pages fetched:        {}\n", stats.pages_fetched));
    report.push_str(&format!(
        "Pages failed:         {} ({} skipped)\n",
        stats.pages_failed, stats.pages_swallowed
    ));
    report.push_str(&format!(
        "Comment fetches:      {} ({} failed)\n",
        stats.child_fetches, stats.child_fetches_failed
    ));
    report.push_str(&format!(
        "Entities enriched:    {} ({} failed)\n",
        stats.vertices_enriched, stats.enrichment_failures
    ));
    report.push('\n');

    if data.total_vertices > 0 {
        report.push_str("Attribute coverage:\n");
        for (key, count) in &data.attribute_coverage {
            report.push_str(&format!("  {:<14} {}/{}\n", key, count, data.total_vertices));
        }
        report.push('\n');
    }

    if let Some(ref vertices) = data.vertices {
        report.push_str(RULE);
        report.push_str("ENTITIES\n");
        report.push_str(RULE);
        report.push('\n');
        report.push_str(&generate_vertex_list(vertices));
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                            End of Report\n");
    report.push_str(RULE);
    report.push_str("\nGenerated by netweave\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let edges_by_kind: BTreeMap<_, _> = data.edges_by_kind.iter().cloned().collect();
    let attribute_coverage: BTreeMap<_, _> = data.attribute_coverage.iter().cloned().collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "netweave",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "session": {
                "id": data.session_id,
                "status": data.session.status,
                "root": data.session.root_handle,
                "level": data.session.level,
                "relation_kinds": data.session.relation_kinds,
                "start_time": format_iso8601_timestamp(data.session.start_time),
                "end_time": data.session.end_time.map(format_iso8601_timestamp),
                "duration_seconds": data.session.end_time.map(|end| end - data.session.start_time),
                "message": data.session.message
            },
            "summary": {
                "total_vertices": data.total_vertices,
                "total_edges": data.total_edges,
                "edges_by_kind": edges_by_kind,
                "top_vertices": data.top_vertices,
                "attribute_coverage": attribute_coverage
            },
            "statistics": data.statistics,
            "vertices": data.vertices
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Short summary of a finished crawl, for the terminal
pub fn generate_result_summary(result: &NetworkResult) -> String {
    let mut summary = String::new();

    if let Some(ref root) = result.root {
        summary.push_str(&format!("Root:         {} ({})\n", root.handle, root.id));
    }
    summary.push_str(&format!("Outcome:      {}\n", format_status(result.outcome.as_str())));
    if let Some(message) = result.outcome.message() {
        summary.push_str(&format!("Message:      {}\n", message));
    }
    summary.push_str(&format!("Vertices:     {}\n", result.graph.vertex_count()));
    summary.push_str(&format!("Edges:        {}\n", result.graph.edge_count()));
    for kind in RelationKind::ALL {
        let count = result.graph.edge_count_by_kind(kind);
        if count > 0 {
            summary.push_str(&format!("  [{}] {}\n", kind, count));
        }
    }

    for failure in &result.failures {
        summary.push_str(&format!("  {} expansion failed: {}\n", failure.kind, failure.error));
    }

    let stats = &result.statistics;
    summary.push_str(&format!(
        "Requests:     {} pages ({} failed), {} comment fetches\n",
        stats.pages_fetched, stats.pages_failed, stats.child_fetches
    ));
    if stats.vertices_enriched + stats.enrichment_failures > 0 {
        summary.push_str(&format!(
            "Enriched:     {} ({} failed)\n",
            stats.vertices_enriched, stats.enrichment_failures
        ));
    }

    summary
}

fn format_status(status: &str) -> &'static str {
    match status {
        "success" => "Success",
        "partial_success" => "Partial success",
        "failed" => "Failed",
        "running" => "Running",
        "cancelled" => "Cancelled",
        _ => "Unknown",
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.to_rfc3339()
}

fn generate_vertex_list(vertices: &[StoredVertex]) -> String {
    if vertices.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut result = String::new();
    for (i, vertex) in vertices.iter().enumerate() {
        let prefix = if i == vertices.len() - 1 { "└── " } else { "├── " };
        result.push_str(&format!("{}{} [{}]", prefix, vertex.label, vertex.entity_id));

        let details: Vec<&str> = [REAL_NAME, LOCATION]
            .iter()
            .filter_map(|key| vertex.attributes.get(*key).map(|v| v.as_str()))
            .collect();
        if !details.is_empty() {
            result.push_str(&format!("  {}", details.join(", ")));
        }
        result.push('\n');
    }

    result
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
