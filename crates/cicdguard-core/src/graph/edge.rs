use super::node::NodeId;
use crate::schema::Relation;
use serde::{Deserialize, Serialize};

/// A directed, typed relationship. Two edges are the same edge when source,
/// relation and target all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub relation: Relation,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: NodeId, relation: Relation, target: NodeId) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }
}
