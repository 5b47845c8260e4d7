//! Finding ledger entries and their two-column text encoding.
//!
//! A node's findings are stored as two parallel columns, `affected_vulns` and
//! `vuln_artifacts`. Each entry is preceded by the delimiter, so an empty
//! column means zero findings and `<d>A<d>B` means two. Columns written by
//! older scanners use `$` as the delimiter; they are still readable, and are
//! rewritten with [`FINDING_DELIMITER`] on the next append.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reserved separator between entries. Not allowed inside an entry.
pub const FINDING_DELIMITER: char = '\u{1f}';

/// Separator used by legacy records.
pub const LEGACY_DELIMITER: char = '$';

/// One (vulnerability ID, evidence) pair attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub vuln_id: String,
    pub evidence: String,
}

impl LedgerEntry {
    pub fn new(vuln_id: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            vuln_id: vuln_id.into(),
            evidence: evidence.into(),
        }
    }
}

fn encode_column<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for value in values {
        out.push(FINDING_DELIMITER);
        out.push_str(value);
    }
    out
}

/// Encode entries as `(affected_vulns, vuln_artifacts)`.
pub fn encode_columns(entries: &[LedgerEntry]) -> (String, String) {
    (
        encode_column(entries.iter().map(|e| e.vuln_id.as_str())),
        encode_column(entries.iter().map(|e| e.evidence.as_str())),
    )
}

fn decode_column(raw: &str) -> Vec<&str> {
    let delimiter = if raw.contains(FINDING_DELIMITER) {
        FINDING_DELIMITER
    } else if raw.contains(LEGACY_DELIMITER) {
        LEGACY_DELIMITER
    } else {
        // Unset, empty, or a bare placeholder such as "None".
        return Vec::new();
    };
    // Whatever precedes the first delimiter is the initial placeholder.
    raw.split(delimiter).skip(1).collect()
}

/// Rebuild entries by positional zip of the two stored columns.
pub fn decode_columns(affected_vulns: &str, vuln_artifacts: &str) -> Vec<LedgerEntry> {
    let vulns = decode_column(affected_vulns);
    let artifacts = decode_column(vuln_artifacts);
    if vulns.len() != artifacts.len() {
        warn!(
            vulns = vulns.len(),
            artifacts = artifacts.len(),
            "finding columns differ in length, keeping the common prefix"
        );
    }
    vulns
        .into_iter()
        .zip(artifacts)
        .map(|(vuln_id, evidence)| LedgerEntry::new(vuln_id, evidence))
        .collect()
}
