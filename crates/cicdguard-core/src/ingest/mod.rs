//! Ingestion passes: turn a fetched snapshot into graph mutations.
//!
//! Each pass upserts nodes, wires the relationships of the schema and records
//! the findings produced by the rule evaluators. A failure on one record is
//! logged and skipped; failures on the top-level object abort the pass.

mod github;
mod jenkins;
mod jfrog;

pub use github::{ingest_github, ingest_workflows};
pub use jenkins::{github_references, ingest_jenkins};
pub use jfrog::ingest_jfrog;

use crate::config::ScanConfig;
use crate::error::GuardResult;
use crate::graph::NodeHandle;
use crate::inventory::{ConnectOutcome, Inventory, RecordOutcome};
use crate::rules::RuleFinding;
use crate::schema::{NodeRecord, Relation};
use crate::store::GraphStore;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Use `record_once` instead of `record` for findings.
    pub dedupe_findings: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            dedupe_findings: true,
        }
    }
}

impl From<&ScanConfig> for IngestOptions {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            dedupe_findings: scan.dedupe_findings,
        }
    }
}

/// Counters for one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub nodes_written: usize,
    pub edges_created: usize,
    pub findings_recorded: usize,
    pub skipped: usize,
    pub problems: Vec<String>,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.nodes_written += other.nodes_written;
        self.edges_created += other.edges_created;
        self.findings_recorded += other.findings_recorded;
        self.skipped += other.skipped;
        self.problems.extend(other.problems);
    }
}

/// Shared bookkeeping for the per-platform passes.
pub(crate) struct Ingestor<'a, S: GraphStore> {
    pub(crate) inventory: &'a mut Inventory<S>,
    options: IngestOptions,
    pub(crate) report: IngestReport,
}

impl<'a, S: GraphStore> Ingestor<'a, S> {
    pub(crate) fn new(inventory: &'a mut Inventory<S>, options: IngestOptions) -> Self {
        Self {
            inventory,
            options,
            report: IngestReport::default(),
        }
    }

    pub(crate) fn upsert<R: NodeRecord>(&mut self, record: &R) -> GuardResult<NodeHandle> {
        let handle = self.inventory.upsert_record(record)?;
        self.report.nodes_written += 1;
        Ok(handle)
    }

    /// Create a node known only by reference, leaving an existing one alone.
    pub(crate) fn ensure<R: NodeRecord>(&mut self, record: &R) -> GuardResult<NodeHandle> {
        self.inventory.ensure_record(record)
    }

    pub(crate) fn connect(
        &mut self,
        source: NodeHandle,
        relation: Relation,
        target: NodeHandle,
    ) -> GuardResult<()> {
        match self.inventory.connect(source, relation, target)? {
            ConnectOutcome::Created => self.report.edges_created += 1,
            ConnectOutcome::AlreadyPresent => {}
            ConnectOutcome::Skipped => self.report.skipped += 1,
        }
        Ok(())
    }

    /// Record evaluator output on the nodes it targets.
    pub(crate) fn apply(&mut self, findings: Vec<RuleFinding>) -> GuardResult<()> {
        for finding in findings {
            let Some(handle) = self.inventory.find(finding.target.kind, &finding.target.key)? else {
                warn!(
                    kind = %finding.target.kind,
                    key = %finding.target.key,
                    vuln = %finding.vuln_id,
                    "Finding target not in inventory, dropped"
                );
                self.report.skipped += 1;
                continue;
            };
            let outcome = if self.options.dedupe_findings {
                self.inventory
                    .record_once(handle, &finding.vuln_id, &finding.evidence)
            } else {
                self.inventory.record(handle, &finding.vuln_id, &finding.evidence)
            };
            match self.skip_recoverable(&finding.vuln_id, outcome)? {
                Some(RecordOutcome::Appended) => self.report.findings_recorded += 1,
                Some(RecordOutcome::Skipped) => self.report.skipped += 1,
                Some(RecordOutcome::Duplicate) | None => {}
            }
        }
        Ok(())
    }

    /// Log and count a recoverable failure, propagate the rest.
    pub(crate) fn skip_recoverable<T>(
        &mut self,
        what: &str,
        result: GuardResult<T>,
    ) -> GuardResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                warn!(item = what, error = %err, "Skipping record");
                self.report.skipped += 1;
                self.report.problems.push(format!("{}: {}", what, err));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn finish(self) -> IngestReport {
        self.report
    }
}
