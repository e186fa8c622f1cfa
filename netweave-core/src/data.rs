use crate::analyzer::NetworkResult;
use crate::model::{NetworkRequest, Outcome, RequestStatistics};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Database {
    conn: Connection,
}

/// One stored crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: String,
    pub root_handle: String,
    pub root_id: Option<String>,
    /// JSON array of relation kind tags
    pub relation_kinds: String,
    pub level: String,
    pub max_per_request: Option<i64>,
    pub statistics: Option<RequestStatistics>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVertex {
    pub entity_id: String,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub source: String,
    pub target: String,
    pub relation_kind: String,
    pub attributes: BTreeMap<String, String>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn attributes_from_json(json: &str) -> BTreeMap<String, String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn to_json_text<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS network_sessions (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'success', 'partial_success', 'cancelled', 'failed')),
    root_handle TEXT NOT NULL,
    root_id TEXT,
    relation_kinds TEXT NOT NULL,  -- JSON array
    level TEXT NOT NULL CHECK(level IN ('1', '1.5', '2')),
    max_per_request INTEGER,
    statistics TEXT,               -- JSON RequestStatistics
    message TEXT
);

CREATE TABLE IF NOT EXISTS vertices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    label TEXT NOT NULL,
    attributes TEXT NOT NULL DEFAULT '{}',  -- JSON object
    discovered_order INTEGER NOT NULL,

    FOREIGN KEY(session_id) REFERENCES network_sessions(id) ON DELETE CASCADE,
    UNIQUE(session_id, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_vertices_session ON vertices(session_id);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    source_vertex_id INTEGER NOT NULL,
    target_vertex_id INTEGER NOT NULL,
    relation_kind TEXT NOT NULL CHECK(relation_kind IN ('contact', 'commenter')),
    attributes TEXT NOT NULL DEFAULT '{}',  -- JSON object

    FOREIGN KEY(session_id) REFERENCES network_sessions(id) ON DELETE CASCADE,
    FOREIGN KEY(source_vertex_id) REFERENCES vertices(id) ON DELETE CASCADE,
    FOREIGN KEY(target_vertex_id) REFERENCES vertices(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_edges_session ON edges(session_id);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_vertex_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_vertex_id);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, request: &NetworkRequest) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let kinds: Vec<&str> = request.kinds().iter().map(|k| k.as_str()).collect();

        self.conn.execute(
            "INSERT INTO network_sessions (id, start_time, status, root_handle, relation_kinds, level, max_per_request)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &session_id,
                current_timestamp(),
                "running",
                request.root_handle.trim(),
                to_json_text(&kinds)?,
                request.level.as_str(),
                request.max_per_request.map(|m| m as i64),
            ],
        )?;

        Ok(session_id)
    }

    pub fn finish_session(
        &self,
        session_id: &str,
        outcome: &Outcome,
        statistics: &RequestStatistics,
        root_id: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE network_sessions
             SET status = ?1, end_time = ?2, statistics = ?3, message = ?4, root_id = ?5
             WHERE id = ?6",
            params![
                outcome.as_str(),
                current_timestamp(),
                to_json_text(statistics)?,
                outcome.message(),
                root_id,
                session_id
            ],
        )?;
        Ok(())
    }

    /// Store the graph of a crawl in one transaction
    pub fn save_graph(&self, session_id: &str, result: &NetworkResult) -> Result<()> {
        let snapshot = result.graph.snapshot();
        let tx = self.conn.unchecked_transaction()?;
        let mut row_ids: HashMap<String, i64> = HashMap::new();

        {
            let mut insert_vertex = tx.prepare(
                "INSERT INTO vertices (session_id, entity_id, label, attributes, discovered_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (order, vertex) in snapshot.vertices.iter().enumerate() {
                insert_vertex.execute(params![
                    session_id,
                    &vertex.id,
                    &vertex.label,
                    to_json_text(&vertex.attributes)?,
                    order as i64,
                ])?;
                row_ids.insert(vertex.id.clone(), tx.last_insert_rowid());
            }

            let mut insert_edge = tx.prepare(
                "INSERT INTO edges (session_id, source_vertex_id, target_vertex_id, relation_kind, attributes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for edge in &snapshot.edges {
                let (Some(source), Some(target)) =
                    (row_ids.get(&edge.source), row_ids.get(&edge.target))
                else {
                    continue;
                };
                insert_edge.execute(params![
                    session_id,
                    source,
                    target,
                    edge.relation_kind.as_str(),
                    to_json_text(&edge.attributes)?,
                ])?;
            }
        }

        tx.commit()
    }

    /// Store a finished crawl: its graph, statistics and outcome
    pub fn record_result(&self, session_id: &str, result: &NetworkResult) -> Result<()> {
        self.save_graph(session_id, result)?;
        self.finish_session(
            session_id,
            &result.outcome,
            &result.statistics,
            result.root.as_ref().map(|r| r.id.as_str()),
        )
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, status, root_handle, root_id, relation_kinds,
                    level, max_per_request, statistics, message
             FROM network_sessions WHERE id = ?1",
        )?;

        stmt.query_row(params![session_id], session_from_row)
            .optional()
    }

    /// All sessions, newest first
    pub fn get_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, status, root_handle, root_id, relation_kinds,
                    level, max_per_request, statistics, message
             FROM network_sessions ORDER BY start_time DESC, rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }

    /// Vertices of a session in discovery order
    pub fn get_vertices(&self, session_id: &str) -> Result<Vec<StoredVertex>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, label, attributes FROM vertices
             WHERE session_id = ?1 ORDER BY discovered_order",
        )?;

        let vertices = stmt
            .query_map(params![session_id], |row| {
                Ok(StoredVertex {
                    entity_id: row.get(0)?,
                    label: row.get(1)?,
                    attributes: attributes_from_json(&row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(vertices)
    }

    pub fn get_edges(&self, session_id: &str) -> Result<Vec<StoredEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.entity_id, t.entity_id, e.relation_kind, e.attributes
             FROM edges e
             JOIN vertices s ON e.source_vertex_id = s.id
             JOIN vertices t ON e.target_vertex_id = t.id
             WHERE e.session_id = ?1
             ORDER BY e.id",
        )?;

        let edges = stmt
            .query_map(params![session_id], |row| {
                Ok(StoredEdge {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    relation_kind: row.get(2)?,
                    attributes: attributes_from_json(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(edges)
    }

    pub fn get_edge_counts_by_kind(&self, session_id: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT relation_kind, COUNT(*) FROM edges WHERE session_id = ?1
             GROUP BY relation_kind ORDER BY relation_kind",
        )?;

        let counts = stmt
            .query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(counts)
    }

    /// Vertices with the most edges, as `(label, degree)`
    pub fn get_top_vertices_by_degree(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.label, COUNT(e.id) AS degree
             FROM vertices v
             LEFT JOIN edges e ON e.source_vertex_id = v.id OR e.target_vertex_id = v.id
             WHERE v.session_id = ?1
             GROUP BY v.id
             ORDER BY degree DESC, v.discovered_order
             LIMIT ?2",
        )?;

        let top = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(top)
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<SessionRecord> {
    let statistics: Option<String> = row.get(9)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        status: row.get(3)?,
        root_handle: row.get(4)?,
        root_id: row.get(5)?,
        relation_kinds: row.get(6)?,
        level: row.get(7)?,
        max_per_request: row.get(8)?,
        statistics: statistics.and_then(|s| serde_json::from_str(&s).ok()),
        message: row.get(10)?,
    })
}
