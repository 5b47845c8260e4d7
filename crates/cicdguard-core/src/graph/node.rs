use super::findings::LedgerEntry;
use crate::schema::{Attributes, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process-unique identifier of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a node returned by the upsert store.
///
/// A handle stays valid until the node's kind is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

/// A node as persisted: schema attributes plus its finding ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub key: String,
    pub attributes: Attributes,
    pub findings: Vec<LedgerEntry>,
}

impl StoredNode {
    pub fn new(kind: NodeKind, key: String, attributes: Attributes) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            key,
            attributes,
            findings: Vec::new(),
        }
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            id: self.id,
            kind: self.kind,
        }
    }

    /// Name shown to users: the natural key.
    pub fn display_name(&self) -> &str {
        &self.key
    }

    pub fn attribute(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).map(String::as_str)
    }
}
