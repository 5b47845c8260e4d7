use super::{IngestOptions, IngestReport, Ingestor};
use crate::error::GuardResult;
use crate::graph::NodeHandle;
use crate::inventory::Inventory;
use crate::rules::jfrog as rules;
use crate::schema::Relation;
use crate::snapshot::{GroupSnapshot, JfrogSnapshot};
use crate::store::GraphStore;
use tracing::info;

/// Ingest one JFrog platform scan.
pub fn ingest_jfrog<S: GraphStore>(
    inventory: &mut Inventory<S>,
    snapshot: &JfrogSnapshot,
    options: IngestOptions,
) -> GuardResult<IngestReport> {
    let mut ingestor = Ingestor::new(inventory, options);
    info!(server = %snapshot.server.url, "Ingesting JFrog scan");

    let server = ingestor.upsert(&snapshot.server)?;
    ingestor.apply(rules::evaluate_server(&snapshot.server, snapshot.anonymous_read))?;

    for group in &snapshot.groups {
        let result = ingestor.group(server, group);
        ingestor.skip_recoverable(&format!("group '{}'", group.group.name), result)?;
    }

    Ok(ingestor.finish())
}

impl<S: GraphStore> Ingestor<'_, S> {
    fn group(&mut self, server: NodeHandle, snapshot: &GroupSnapshot) -> GuardResult<()> {
        let group = self.upsert(&snapshot.group)?;
        self.connect(server, Relation::Has, group)?;

        for member in &snapshot.members {
            let result = self
                .upsert(member)
                .and_then(|user| self.connect(group, Relation::PartOf, user));
            let what = format!("group {} member '{}'", snapshot.group.name, member.name);
            self.skip_recoverable(&what, result)?;
        }
        Ok(())
    }
}
