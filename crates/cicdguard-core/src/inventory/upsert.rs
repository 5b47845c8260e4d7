use super::Inventory;
use crate::error::{GuardError, GuardResult};
use crate::graph::{NodeHandle, StoredNode};
use crate::schema::{self, Attributes, NodeKind, NodeRecord, Platform};
use crate::store::GraphStore;
use tracing::{debug, info};

impl<S: GraphStore> Inventory<S> {
    /// Get-or-create a node by natural key.
    ///
    /// `attributes` must hold every schema field of `kind`. An existing node
    /// keeps its id and findings; its other attributes are replaced.
    pub fn upsert(&mut self, kind: NodeKind, attributes: &Attributes) -> GuardResult<NodeHandle> {
        let attributes = schema::normalize(kind, attributes)?;
        let key = attributes
            .get(kind.key_field())
            .cloned()
            .ok_or_else(|| GuardError::malformed(kind, kind.key_field(), "is missing"))?;

        match self.store.find_by_key(kind, &key)? {
            Some(mut node) => {
                node.attributes = attributes;
                self.store.save_node(&node)?;
                debug!(kind = %kind, key = %key, "Updated node");
                Ok(node.handle())
            }
            None => {
                let node = StoredNode::new(kind, key, attributes);
                self.store.save_node(&node)?;
                info!(kind = %kind, key = %node.key, "Created node");
                Ok(node.handle())
            }
        }
    }

    pub fn upsert_record<R: NodeRecord>(&mut self, record: &R) -> GuardResult<NodeHandle> {
        self.upsert(R::KIND, &record.to_attributes())
    }

    /// Create the node only if no node with the same key exists yet. Used for
    /// nodes known only by reference, whose attributes must not clobber a
    /// fully scanned node.
    pub fn ensure_record<R: NodeRecord>(&mut self, record: &R) -> GuardResult<NodeHandle> {
        match self.find(R::KIND, record.natural_key())? {
            Some(handle) => Ok(handle),
            None => self.upsert_record(record),
        }
    }

    pub fn find(&self, kind: NodeKind, key: &str) -> GuardResult<Option<NodeHandle>> {
        Ok(self.store.find_by_key(kind, key)?.map(|node| node.handle()))
    }

    pub fn node(&self, handle: NodeHandle) -> GuardResult<Option<StoredNode>> {
        Ok(self.store.load_node(&handle.id)?)
    }

    /// Read a node back as its typed record.
    pub fn record_of<R: NodeRecord>(&self, handle: NodeHandle) -> GuardResult<Option<R>> {
        if handle.kind != R::KIND {
            return Ok(None);
        }
        match self.store.load_node(&handle.id)? {
            Some(node) => R::from_attributes(&node.attributes).map(Some),
            None => Ok(None),
        }
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> GuardResult<Vec<StoredNode>> {
        Ok(self.store.nodes_of_kind(kind)?)
    }

    pub fn count(&self, kind: NodeKind) -> GuardResult<usize> {
        Ok(self.store.nodes_of_kind(kind)?.len())
    }

    /// Delete every node of `kind` and the edges touching them.
    pub fn reset_kind(&mut self, kind: NodeKind) -> GuardResult<usize> {
        let removed = self.store.clear_kind(kind)?;
        if removed > 0 {
            info!(kind = %kind, removed, "Reset node kind");
        }
        Ok(removed)
    }

    pub fn reset_platform(&mut self, platform: Platform) -> GuardResult<usize> {
        let mut removed = 0;
        for kind in platform.kinds() {
            removed += self.reset_kind(kind)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{attrs, inventory};
    use crate::error::GuardError;
    use crate::schema::{GithubRepository, NodeKind, Platform, Visibility};

    #[test]
    fn test_upsert_is_idempotent_by_key() {
        let mut inv = inventory();
        let fields = attrs(&[("name", "build")]);
        let first = inv.upsert(NodeKind::ActionJob, &fields).unwrap();
        let second = inv.upsert(NodeKind::ActionJob, &fields).unwrap();

        assert_eq!(first, second);
        assert_eq!(inv.count(NodeKind::ActionJob).unwrap(), 1);
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let mut inv = inventory();
        let handle = inv
            .upsert(
                NodeKind::GithubTeam,
                &attrs(&[("name", "ops"), ("description", "old"), ("permission", "pull")]),
            )
            .unwrap();
        inv.record(handle, "SIA011", "evidence").unwrap();

        inv.upsert(
            NodeKind::GithubTeam,
            &attrs(&[("name", "ops"), ("description", "new"), ("permission", "admin")]),
        )
        .unwrap();

        let node = inv.node(handle).unwrap().unwrap();
        assert_eq!(node.attribute("description"), Some("new"));
        assert_eq!(node.attribute("permission"), Some("admin"));
        assert_eq!(node.findings.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_missing_field_without_writing() {
        let mut inv = inventory();
        let err = inv
            .upsert(
                NodeKind::JenkinsServer,
                &attrs(&[("url", "https://ci"), ("https_enabled", "True")]),
            )
            .unwrap_err();
        assert!(matches!(err, GuardError::MalformedRecord { .. }));
        assert_eq!(inv.count(NodeKind::JenkinsServer).unwrap(), 0);
    }

    #[test]
    fn test_upsert_rejects_bad_boolean() {
        let mut inv = inventory();
        let err = inv
            .upsert(
                NodeKind::GithubOrganization,
                &attrs(&[("name", "acme"), ("two_factor_enabled", "sometimes")]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("two_factor_enabled"));
    }

    #[test]
    fn test_ensure_record_does_not_overwrite() {
        let mut inv = inventory();
        let scanned = GithubRepository {
            name: "acme/api".into(),
            visibility: Visibility::Private,
            dependabot_enabled: true,
            ..Default::default()
        };
        let handle = inv.upsert_record(&scanned).unwrap();

        let placeholder = GithubRepository {
            name: "acme/api".into(),
            ..Default::default()
        };
        assert_eq!(inv.ensure_record(&placeholder).unwrap(), handle);

        let stored: GithubRepository = inv.record_of(handle).unwrap().unwrap();
        assert_eq!(stored, scanned);
    }

    #[test]
    fn test_reset_platform_only_touches_its_kinds() {
        let mut inv = inventory();
        inv.upsert(NodeKind::ActionJob, &attrs(&[("name", "build")])).unwrap();
        inv.upsert(
            NodeKind::JfrogServer,
            &attrs(&[("url", "https://jfrog"), ("https_enabled", "True")]),
        )
        .unwrap();

        assert_eq!(inv.reset_platform(Platform::GitHub).unwrap(), 1);
        assert_eq!(inv.count(NodeKind::ActionJob).unwrap(), 0);
        assert_eq!(inv.count(NodeKind::JfrogServer).unwrap(), 1);
    }
}
