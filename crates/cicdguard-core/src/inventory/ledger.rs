use super::Inventory;
use crate::error::{GuardError, GuardResult};
use crate::graph::{LedgerEntry, NodeHandle, FINDING_DELIMITER};
use crate::schema::NodeKind;
use crate::store::GraphStore;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of appending a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordOutcome {
    Appended,
    /// `record_once` found the identical pair already on the node.
    Duplicate,
    /// The node could not be resolved; nothing was written.
    Skipped,
}

fn validate(kind: NodeKind, vuln_id: &str, evidence: &str) -> GuardResult<()> {
    if vuln_id.trim().is_empty() {
        return Err(GuardError::malformed(kind, "affected_vulns", "has an empty vulnerability id"));
    }
    if vuln_id.contains(FINDING_DELIMITER) {
        return Err(GuardError::malformed(
            kind,
            "affected_vulns",
            "contains the reserved finding delimiter",
        ));
    }
    if evidence.contains(FINDING_DELIMITER) {
        return Err(GuardError::malformed(
            kind,
            "vuln_artifacts",
            "contains the reserved finding delimiter",
        ));
    }
    Ok(())
}

impl<S: GraphStore> Inventory<S> {
    /// Append a finding. Identical pairs are appended again.
    pub fn record(
        &mut self,
        handle: NodeHandle,
        vuln_id: &str,
        evidence: &str,
    ) -> GuardResult<RecordOutcome> {
        self.append(handle, vuln_id, evidence, false)
    }

    /// Append a finding unless the node already carries the exact pair.
    pub fn record_once(
        &mut self,
        handle: NodeHandle,
        vuln_id: &str,
        evidence: &str,
    ) -> GuardResult<RecordOutcome> {
        self.append(handle, vuln_id, evidence, true)
    }

    fn append(
        &mut self,
        handle: NodeHandle,
        vuln_id: &str,
        evidence: &str,
        once: bool,
    ) -> GuardResult<RecordOutcome> {
        validate(handle.kind, vuln_id, evidence)?;

        let Some(mut node) = self.store.load_node(&handle.id)? else {
            let miss = GuardError::LookupMiss {
                kind: handle.kind,
                key: handle.id.to_string(),
            };
            warn!(vuln = vuln_id, "{}, finding dropped", miss);
            return Ok(RecordOutcome::Skipped);
        };

        let entry = LedgerEntry::new(vuln_id, evidence);
        if once && node.findings.contains(&entry) {
            debug!(kind = %node.kind, key = %node.key, vuln = vuln_id, "Finding already recorded");
            return Ok(RecordOutcome::Duplicate);
        }

        node.findings.push(entry);
        self.store.save_node(&node)?;
        info!(kind = %node.kind, key = %node.key, vuln = vuln_id, "Recorded finding");
        Ok(RecordOutcome::Appended)
    }

    /// Findings of a node in append order.
    pub fn list_findings(&self, handle: NodeHandle) -> GuardResult<Vec<LedgerEntry>> {
        match self.store.load_node(&handle.id)? {
            Some(node) => Ok(node.findings),
            None => Err(GuardError::LookupMiss {
                kind: handle.kind,
                key: handle.id.to_string(),
            }),
        }
    }
}
