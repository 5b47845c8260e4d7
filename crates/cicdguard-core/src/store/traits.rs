//! Storage trait definitions

use crate::graph::{Edge, NodeId, StoredNode};
use crate::schema::NodeKind;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A stored row no longer matches the schema (unknown label, bad id).
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for inventory graph backends
///
/// Every write is persisted before the call returns.
pub trait GraphStore {
    // === Node Operations ===

    /// Look a node up by its natural key
    fn find_by_key(&self, kind: NodeKind, key: &str) -> StoreResult<Option<StoredNode>>;

    /// Load a node by ID
    fn load_node(&self, id: &NodeId) -> StoreResult<Option<StoredNode>>;

    /// Save a node (insert or update by ID)
    fn save_node(&mut self, node: &StoredNode) -> StoreResult<()>;

    /// All nodes of one kind, in insertion order
    fn nodes_of_kind(&self, kind: NodeKind) -> StoreResult<Vec<StoredNode>>;

    /// Delete every node of a kind together with the edges touching them.
    /// Returns the number of nodes removed.
    fn clear_kind(&mut self, kind: NodeKind) -> StoreResult<usize>;

    // === Edge Operations ===

    /// Insert an edge unless an identical one exists. Returns true when inserted.
    fn save_edge(&mut self, edge: &Edge) -> StoreResult<bool>;

    fn has_edge(&self, edge: &Edge) -> StoreResult<bool>;

    /// Get edges originating from a node
    fn edges_from(&self, id: &NodeId) -> StoreResult<Vec<Edge>>;

    /// Every edge in the store
    fn all_edges(&self) -> StoreResult<Vec<Edge>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}
