//! SQLite storage backend

use super::traits::{GraphStore, OpenStore, StoreError, StoreResult};
use crate::graph::{decode_columns, encode_columns, Edge, NodeId, StoredNode};
use crate::schema::{Attributes, NodeKind, Relation};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const NODE_COLUMNS: &str =
    "id, kind, natural_key, attributes_json, affected_vulns, vuln_artifacts";

/// Raw `nodes` row before validation.
type NodeRow = (String, String, String, String, String, String);

/// SQLite-backed inventory store
///
/// One `nodes` table unique on `(kind, natural_key)` and one `edges` table
/// keyed by `(source_id, relation, target_id)`. Findings are kept in the two
/// delimited TEXT columns `affected_vulns` and `vuln_artifacts`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                natural_key TEXT NOT NULL,
                attributes_json TEXT NOT NULL,
                affected_vulns TEXT NOT NULL DEFAULT '',
                vuln_artifacts TEXT NOT NULL DEFAULT '',
                UNIQUE (kind, natural_key)
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);

            CREATE TABLE IF NOT EXISTS edges (
                source_id TEXT NOT NULL,
                relation TEXT NOT NULL,
                target_id TEXT NOT NULL,
                PRIMARY KEY (source_id, relation, target_id)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn read_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn row_to_node(row: NodeRow) -> StoreResult<StoredNode> {
        let (id, kind, key, attributes_json, affected_vulns, vuln_artifacts) = row;
        let id = NodeId::parse(&id).ok_or_else(|| StoreError::Corrupt(format!("bad node id '{}'", id)))?;
        let kind = NodeKind::from_label(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown node kind '{}'", kind)))?;
        let attributes: Attributes = serde_json::from_str(&attributes_json)?;

        Ok(StoredNode {
            id,
            kind,
            key,
            attributes,
            findings: decode_columns(&affected_vulns, &vuln_artifacts),
        })
    }

    fn row_to_edge(source: String, relation: String, target: String) -> StoreResult<Edge> {
        let parse_id = |raw: &str| {
            NodeId::parse(raw).ok_or_else(|| StoreError::Corrupt(format!("bad node id '{}'", raw)))
        };
        let relation = Relation::from_label(&relation)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown relation '{}'", relation)))?;
        Ok(Edge::new(parse_id(&source)?, relation, parse_id(&target)?))
    }

    fn query_edges(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Edge>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<(String, String, String)>, _>>()?;
        rows.into_iter()
            .map(|(source, relation, target)| Self::row_to_edge(source, relation, target))
            .collect()
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl GraphStore for SqliteStore {
    fn find_by_key(&self, kind: NodeKind, key: &str) -> StoreResult<Option<StoredNode>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE kind = ?1 AND natural_key = ?2", NODE_COLUMNS),
                params![kind.label(), key],
                Self::read_node,
            )
            .optional()?;
        row.map(Self::row_to_node).transpose()
    }

    fn load_node(&self, id: &NodeId) -> StoreResult<Option<StoredNode>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id.to_string()],
                Self::read_node,
            )
            .optional()?;
        row.map(Self::row_to_node).transpose()
    }

    fn save_node(&mut self, node: &StoredNode) -> StoreResult<()> {
        let attributes_json = serde_json::to_string(&node.attributes)?;
        let (affected_vulns, vuln_artifacts) = encode_columns(&node.findings);
        self.conn.execute(
            "INSERT INTO nodes (id, kind, natural_key, attributes_json, affected_vulns, vuln_artifacts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                natural_key = excluded.natural_key,
                attributes_json = excluded.attributes_json,
                affected_vulns = excluded.affected_vulns,
                vuln_artifacts = excluded.vuln_artifacts",
            params![
                node.id.to_string(),
                node.kind.label(),
                node.key,
                attributes_json,
                affected_vulns,
                vuln_artifacts,
            ],
        )?;
        Ok(())
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> StoreResult<Vec<StoredNode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE kind = ?1 ORDER BY rowid",
            NODE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![kind.label()], Self::read_node)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::row_to_node).collect()
    }

    fn clear_kind(&mut self, kind: NodeKind) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM edges
             WHERE source_id IN (SELECT id FROM nodes WHERE kind = ?1)
                OR target_id IN (SELECT id FROM nodes WHERE kind = ?1)",
            params![kind.label()],
        )?;
        let removed = tx.execute("DELETE FROM nodes WHERE kind = ?1", params![kind.label()])?;
        tx.commit()?;
        Ok(removed)
    }

    fn save_edge(&mut self, edge: &Edge) -> StoreResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO edges (source_id, relation, target_id) VALUES (?1, ?2, ?3)",
            params![
                edge.source.to_string(),
                edge.relation.label(),
                edge.target.to_string()
            ],
        )?;
        Ok(inserted > 0)
    }

    fn has_edge(&self, edge: &Edge) -> StoreResult<bool> {
        let found: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM edges WHERE source_id = ?1 AND relation = ?2 AND target_id = ?3",
            params![
                edge.source.to_string(),
                edge.relation.label(),
                edge.target.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn edges_from(&self, id: &NodeId) -> StoreResult<Vec<Edge>> {
        let id = id.to_string();
        self.query_edges(
            "SELECT source_id, relation, target_id FROM edges WHERE source_id = ?1 ORDER BY rowid",
            &[&id as &dyn rusqlite::ToSql],
        )
    }

    fn all_edges(&self) -> StoreResult<Vec<Edge>> {
        self.query_edges(
            "SELECT source_id, relation, target_id FROM edges ORDER BY rowid",
            &[],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LedgerEntry;
    use tempfile::TempDir;

    fn server(url: &str) -> StoredNode {
        let mut attrs = Attributes::new();
        attrs.insert("url".into(), url.into());
        attrs.insert("https_enabled".into(), "False".into());
        attrs.insert("version".into(), "2.440".into());
        StoredNode::new(NodeKind::JenkinsServer, url.into(), attrs)
    }

    #[test]
    fn test_node_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("inventory.db");

        let mut node = server("http://ci.local");
        node.findings.push(LedgerEntry::new("JNK003", "http://ci.local"));
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save_node(&node).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store
            .find_by_key(NodeKind::JenkinsServer, "http://ci.local")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, node);
    }

    #[test]
    fn test_save_node_updates_in_place() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut node = server("http://ci.local");
        store.save_node(&node).unwrap();

        node.attributes.insert("version".into(), "2.450".into());
        store.save_node(&node).unwrap();

        let nodes = store.nodes_of_kind(NodeKind::JenkinsServer).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attribute("version"), Some("2.450"));
    }

    #[test]
    fn test_edges_are_unique_and_cleared_with_kind() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let srv = server("http://ci.local");
        let job = StoredNode::new(NodeKind::JenkinsJob, "deploy".into(), Attributes::new());
        store.save_node(&srv).unwrap();
        store.save_node(&job).unwrap();

        let edge = Edge::new(srv.id, Relation::Executes, job.id);
        assert!(store.save_edge(&edge).unwrap());
        assert!(!store.save_edge(&edge).unwrap());
        assert!(store.has_edge(&edge).unwrap());
        assert_eq!(store.all_edges().unwrap().len(), 1);

        assert_eq!(store.clear_kind(NodeKind::JenkinsJob).unwrap(), 1);
        assert!(store.all_edges().unwrap().is_empty());
        assert!(store.load_node(&srv.id).unwrap().is_some());
    }

    #[test]
    fn test_legacy_finding_columns_are_readable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let node = server("http://old.local");
        store
            .conn
            .execute(
                "INSERT INTO nodes (id, kind, natural_key, attributes_json, affected_vulns, vuln_artifacts)
                 VALUES (?1, 'Jenkins_Server', 'http://old.local', ?2, '$JNK003$JNK005', '$http://old.local$anonymous')",
                params![node.id.to_string(), serde_json::to_string(&node.attributes).unwrap()],
            )
            .unwrap();

        let loaded = store.load_node(&node.id).unwrap().unwrap();
        assert_eq!(loaded.findings.len(), 2);
        assert_eq!(loaded.findings[1], LedgerEntry::new("JNK005", "anonymous"));
    }
}
