//! In-memory backend on a petgraph adjacency graph.

use super::traits::{GraphStore, StoreError, StoreResult};
use crate::graph::{Edge, NodeId, StoredNode};
use crate::schema::{NodeKind, Relation};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// Volatile graph store for tests and dry runs.
///
/// Nodes live in a `StableDiGraph` so indices survive kind resets.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: StableDiGraph<StoredNode, Relation>,
    id_map: HashMap<NodeId, NodeIndex>,
    key_map: HashMap<(NodeKind, String), NodeIndex>,
    /// Creation order, since freed graph slots are reused.
    order: Vec<NodeId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn to_edge(&self, source: NodeIndex, relation: Relation, target: NodeIndex) -> Edge {
        Edge::new(self.graph[source].id, relation, self.graph[target].id)
    }
}

impl GraphStore for MemoryStore {
    fn find_by_key(&self, kind: NodeKind, key: &str) -> StoreResult<Option<StoredNode>> {
        Ok(self
            .key_map
            .get(&(kind, key.to_string()))
            .map(|&idx| self.graph[idx].clone()))
    }

    fn load_node(&self, id: &NodeId) -> StoreResult<Option<StoredNode>> {
        Ok(self.id_map.get(id).map(|&idx| self.graph[idx].clone()))
    }

    fn save_node(&mut self, node: &StoredNode) -> StoreResult<()> {
        if let Some(&idx) = self.id_map.get(&node.id) {
            let previous = &self.graph[idx];
            if previous.key != node.key {
                self.key_map.remove(&(previous.kind, previous.key.clone()));
                self.key_map.insert((node.kind, node.key.clone()), idx);
            }
            self.graph[idx] = node.clone();
            return Ok(());
        }

        let idx = self.graph.add_node(node.clone());
        self.id_map.insert(node.id, idx);
        self.key_map.insert((node.kind, node.key.clone()), idx);
        self.order.push(node.id);
        Ok(())
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> StoreResult<Vec<StoredNode>> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.id_map.get(id))
            .map(|&idx| &self.graph[idx])
            .filter(|node| node.kind == kind)
            .cloned()
            .collect())
    }

    fn clear_kind(&mut self, kind: NodeKind) -> StoreResult<usize> {
        let doomed: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].kind == kind)
            .collect();

        for &idx in &doomed {
            // Removing a node also drops every edge touching it.
            if let Some(node) = self.graph.remove_node(idx) {
                self.id_map.remove(&node.id);
                self.key_map.remove(&(node.kind, node.key));
            }
        }
        let id_map = &self.id_map;
        self.order.retain(|id| id_map.contains_key(id));
        Ok(doomed.len())
    }

    fn save_edge(&mut self, edge: &Edge) -> StoreResult<bool> {
        if self.has_edge(edge)? {
            return Ok(false);
        }
        let (Some(&from), Some(&to)) = (self.id_map.get(&edge.source), self.id_map.get(&edge.target))
        else {
            return Err(StoreError::NodeNotFound(
                if self.id_map.contains_key(&edge.source) { edge.target } else { edge.source },
            ));
        };
        self.graph.add_edge(from, to, edge.relation);
        Ok(true)
    }

    fn has_edge(&self, edge: &Edge) -> StoreResult<bool> {
        let (Some(&from), Some(&to)) = (self.id_map.get(&edge.source), self.id_map.get(&edge.target))
        else {
            return Ok(false);
        };
        Ok(self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == edge.relation))
    }

    fn edges_from(&self, id: &NodeId) -> StoreResult<Vec<Edge>> {
        let Some(&idx) = self.id_map.get(id) else {
            return Ok(Vec::new());
        };
        let mut edges: Vec<Edge> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.to_edge(e.source(), *e.weight(), e.target()))
            .collect();
        // petgraph walks outgoing edges newest first.
        edges.reverse();
        Ok(edges)
    }

    fn all_edges(&self) -> StoreResult<Vec<Edge>> {
        Ok(self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (source, target) = self.graph.edge_endpoints(e)?;
                Some(self.to_edge(source, self.graph[e], target))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attributes;

    fn node(kind: NodeKind, key: &str) -> StoredNode {
        StoredNode::new(kind, key.to_string(), Attributes::new())
    }

    #[test]
    fn test_save_and_find_by_key() {
        let mut store = MemoryStore::new();
        let repo = node(NodeKind::GithubRepository, "api");
        store.save_node(&repo).unwrap();

        let found = store.find_by_key(NodeKind::GithubRepository, "api").unwrap().unwrap();
        assert_eq!(found.id, repo.id);
        assert!(store.find_by_key(NodeKind::GithubTeam, "api").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_edge_is_not_inserted() {
        let mut store = MemoryStore::new();
        let org = node(NodeKind::GithubOrganization, "acme");
        let repo = node(NodeKind::GithubRepository, "api");
        store.save_node(&org).unwrap();
        store.save_node(&repo).unwrap();

        let edge = Edge::new(org.id, Relation::PartOf, repo.id);
        assert!(store.save_edge(&edge).unwrap());
        assert!(!store.save_edge(&edge).unwrap());
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.edges_from(&org.id).unwrap(), vec![edge]);
    }

    #[test]
    fn test_clear_kind_drops_touching_edges() {
        let mut store = MemoryStore::new();
        let org = node(NodeKind::GithubOrganization, "acme");
        let repo = node(NodeKind::GithubRepository, "api");
        store.save_node(&org).unwrap();
        store.save_node(&repo).unwrap();
        store
            .save_edge(&Edge::new(org.id, Relation::PartOf, repo.id))
            .unwrap();

        assert_eq!(store.clear_kind(NodeKind::GithubRepository).unwrap(), 1);
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.edge_count(), 0);
        assert!(store.load_node(&repo.id).unwrap().is_none());
    }

    #[test]
    fn test_nodes_of_kind_keeps_creation_order() {
        let mut store = MemoryStore::new();
        for name in ["b", "a", "c"] {
            store.save_node(&node(NodeKind::ActionJob, name)).unwrap();
        }
        let keys: Vec<String> = store
            .nodes_of_kind(NodeKind::ActionJob)
            .unwrap()
            .into_iter()
            .map(|n| n.key)
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
