//! Read-side projections of the inventory: the vulnerability table, SARIF and
//! graph exports.

pub mod graph_export;
pub mod sarif;

pub use graph_export::{to_dot, to_mermaid};
pub use sarif::to_sarif;

use crate::error::GuardResult;
use crate::inventory::Inventory;
use crate::rules::{lookup, Severity};
use crate::schema::NodeKind;
use crate::store::GraphStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One finding projected for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerabilityRow {
    pub vuln_id: String,
    pub title: String,
    pub description: String,
    /// `None` when the ID is not in the catalog.
    pub severity: Option<Severity>,
    pub technology: String,
    pub artifact: String,
    pub further_read: String,
    pub node_kind: NodeKind,
    pub node_key: String,
}

/// Walk every node kind and project each ledger entry into a row.
///
/// Rows come out grouped by kind (in [`NodeKind::ALL`] order), then by node
/// insertion order, then by ledger order.
pub fn vulnerability_rows<S: GraphStore>(inventory: &Inventory<S>) -> GuardResult<Vec<VulnerabilityRow>> {
    let mut rows = Vec::new();
    for kind in NodeKind::ALL {
        for node in inventory.nodes_of_kind(kind)? {
            for entry in &node.findings {
                let rule = lookup(&entry.vuln_id);
                rows.push(VulnerabilityRow {
                    title: rule.map(|r| r.title.to_string()).unwrap_or_else(|| entry.vuln_id.clone()),
                    description: rule
                        .map(|r| r.description.to_string())
                        .unwrap_or_else(|| "Unknown vulnerability".to_string()),
                    severity: rule.map(|r| r.severity),
                    further_read: rule.map(|r| r.further_read.to_string()).unwrap_or_default(),
                    technology: kind.technology().to_string(),
                    artifact: format!("{} {}", entry.evidence, node.display_name()),
                    vuln_id: entry.vuln_id.clone(),
                    node_kind: kind,
                    node_key: node.key.clone(),
                });
            }
        }
    }
    Ok(rows)
}

/// Per-severity totals over a set of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn tally(rows: &[VulnerabilityRow]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match row.severity {
                Some(Severity::Critical) => counts.critical += 1,
                Some(Severity::High) => counts.high += 1,
                Some(Severity::Medium) => counts.medium += 1,
                Some(Severity::Low) => counts.low += 1,
                Some(Severity::Info) => counts.info += 1,
                None => counts.unknown += 1,
            }
        }
        counts
    }
}

/// Snapshot of the ledger for `vulns --format json` and SARIF output.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub severity_counts: SeverityCounts,
    pub rows: Vec<VulnerabilityRow>,
}

impl ScanReport {
    pub fn build<S: GraphStore>(inventory: &Inventory<S>) -> GuardResult<Self> {
        let rows = vulnerability_rows(inventory)?;
        let mut total_nodes = 0;
        for kind in NodeKind::ALL {
            total_nodes += inventory.count(kind)?;
        }
        Ok(Self {
            generated_at: Utc::now(),
            total_nodes,
            total_edges: inventory.edges()?.len(),
            severity_counts: SeverityCounts::tally(&rows),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::test_support::inventory;
    use crate::schema::{JenkinsServer, JfrogServer};

    #[test]
    fn test_rows_project_catalog_metadata() {
        let mut inv = inventory();
        let server = inv
            .upsert_record(&JenkinsServer {
                url: "http://jenkins.local".into(),
                https_enabled: false,
                version: "2.440".into(),
            })
            .unwrap();
        inv.record(server, "JNK003", "http://jenkins.local").unwrap();
        inv.record(server, "XYZ999", "custom").unwrap();

        let rows = vulnerability_rows(&inv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].technology, "Jenkins Server");
        assert_eq!(rows[0].artifact, "http://jenkins.local http://jenkins.local");
        assert!(rows[0].severity.is_some());
        assert!(!rows[0].further_read.is_empty());
        assert_eq!(rows[1].description, "Unknown vulnerability");
        assert_eq!(rows[1].severity, None);
    }

    #[test]
    fn test_report_counts() {
        let mut inv = inventory();
        let server = inv
            .upsert_record(&JfrogServer {
                url: "http://artifacts.local".into(),
                https_enabled: false,
            })
            .unwrap();
        inv.record(server, "JFG003", "http://artifacts.local").unwrap();

        let report = ScanReport::build(&inv).unwrap();
        assert_eq!(report.total_nodes, 1);
        assert_eq!(report.total_edges, 0);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.severity_counts.unknown, 0);
    }

    #[test]
    fn test_empty_inventory_has_no_rows() {
        let inv = inventory();
        assert!(vulnerability_rows(&inv).unwrap().is_empty());
    }
}
