//! Rule evaluators: pure functions from raw platform data to findings.
//!
//! Evaluators never touch the graph. Each finding names its target node by
//! kind and natural key; the ingestion passes resolve and record it.

pub mod actions;
pub mod catalog;
pub mod jenkins;
pub mod jfrog;

pub use catalog::{lookup, Severity, VulnRule, CATALOG};

use crate::schema::NodeKind;
use serde::Serialize;
use std::collections::HashSet;

/// The node a finding belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleTarget {
    pub kind: NodeKind,
    pub key: String,
}

impl RuleTarget {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleFinding {
    pub target: RuleTarget,
    pub vuln_id: String,
    pub evidence: String,
}

impl RuleFinding {
    pub fn new(target: RuleTarget, vuln_id: &str, evidence: impl Into<String>) -> Self {
        Self {
            target,
            vuln_id: vuln_id.to_string(),
            evidence: evidence.into(),
        }
    }
}

/// Drop repeated (target, vuln, evidence) triples, keeping first occurrences.
pub(crate) fn dedupe(findings: Vec<RuleFinding>) -> Vec<RuleFinding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|finding| seen.insert(finding.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_order() {
        let t = RuleTarget::new(NodeKind::ActionWorkflow, "ci");
        let findings = vec![
            RuleFinding::new(t.clone(), "SIA002", "a"),
            RuleFinding::new(t.clone(), "SIA002", "b"),
            RuleFinding::new(t.clone(), "SIA002", "a"),
        ];
        let kept = dedupe(findings);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].evidence, "b");
    }
}
