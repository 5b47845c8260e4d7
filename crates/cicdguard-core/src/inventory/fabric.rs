use super::Inventory;
use crate::error::{GuardError, GuardResult};
use crate::graph::{Edge, NodeHandle, StoredNode};
use crate::schema::{self, NodeKind, Relation};
use crate::store::GraphStore;
use serde::Serialize;
use tracing::{debug, warn};

/// Result of asserting a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectOutcome {
    Created,
    AlreadyPresent,
    /// An endpoint could not be resolved; nothing was written.
    Skipped,
}

impl<S: GraphStore> Inventory<S> {
    /// Assert `source -relation-> target`. Repeating the call is a no-op.
    pub fn connect(
        &mut self,
        source: NodeHandle,
        relation: Relation,
        target: NodeHandle,
    ) -> GuardResult<ConnectOutcome> {
        check_relation(source.kind, relation, target.kind)?;

        for handle in [source, target] {
            if self.store.load_node(&handle.id)?.is_none() {
                let miss = GuardError::LookupMiss {
                    kind: handle.kind,
                    key: handle.id.to_string(),
                };
                warn!(relation = %relation, "{}, skipping connection", miss);
                return Ok(ConnectOutcome::Skipped);
            }
        }

        let edge = Edge::new(source.id, relation, target.id);
        if self.store.save_edge(&edge)? {
            debug!(source = %source, relation = %relation, target = %target, "Created edge");
            Ok(ConnectOutcome::Created)
        } else {
            Ok(ConnectOutcome::AlreadyPresent)
        }
    }

    /// Like [`connect`](Self::connect), resolving the target by natural key.
    pub fn connect_key(
        &mut self,
        source: NodeHandle,
        relation: Relation,
        target_kind: NodeKind,
        target_key: &str,
    ) -> GuardResult<ConnectOutcome> {
        check_relation(source.kind, relation, target_kind)?;
        match self.find(target_kind, target_key)? {
            Some(target) => self.connect(source, relation, target),
            None => {
                let miss = GuardError::LookupMiss {
                    kind: target_kind,
                    key: target_key.to_string(),
                };
                warn!(relation = %relation, "{}, skipping connection", miss);
                Ok(ConnectOutcome::Skipped)
            }
        }
    }

    pub fn edges_from(&self, handle: NodeHandle) -> GuardResult<Vec<Edge>> {
        Ok(self.store.edges_from(&handle.id)?)
    }

    pub fn edges(&self) -> GuardResult<Vec<Edge>> {
        Ok(self.store.all_edges()?)
    }

    /// Targets reached from `handle` over `relation`.
    pub fn neighbors(&self, handle: NodeHandle, relation: Relation) -> GuardResult<Vec<StoredNode>> {
        let mut nodes = Vec::new();
        for edge in self.store.edges_from(&handle.id)? {
            if edge.relation != relation {
                continue;
            }
            if let Some(node) = self.store.load_node(&edge.target)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}

fn check_relation(source: NodeKind, relation: Relation, target: NodeKind) -> GuardResult<()> {
    if schema::allows(source, relation, target) {
        Ok(())
    } else {
        Err(GuardError::SchemaViolation {
            from_kind: source,
            relation,
            to_kind: target,
        })
    }
}
