use super::{ScanReport, VulnerabilityRow};
use crate::rules::lookup;
use serde_json::json;

/// Render a scan report as SARIF 2.1.0.
///
/// Inventory nodes have no source file, so each result carries a logical
/// location (`<node kind>/<natural key>`) instead of a physical one.
pub fn to_sarif(report: &ScanReport) -> serde_json::Value {
    let mut rule_ids: Vec<&str> = Vec::new();
    for row in &report.rows {
        if !rule_ids.contains(&row.vuln_id.as_str()) {
            rule_ids.push(&row.vuln_id);
        }
    }

    let rules: Vec<serde_json::Value> = rule_ids.iter().map(|id| sarif_rule(id)).collect();
    let results: Vec<serde_json::Value> = report.rows.iter().map(sarif_result).collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "cicdguard",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                }
            },
            "results": results,
            "invocations": [{
                "executionSuccessful": true,
                "endTimeUtc": report.generated_at.to_rfc3339(),
            }]
        }]
    })
}

fn sarif_rule(id: &str) -> serde_json::Value {
    match lookup(id) {
        Some(rule) => json!({
            "id": rule.id,
            "name": rule.title,
            "shortDescription": { "text": rule.title },
            "fullDescription": { "text": rule.description },
            "helpUri": rule.further_read,
            "defaultConfiguration": { "level": rule.severity.sarif_level() },
            "properties": { "platform": rule.platform.name() },
        }),
        None => json!({
            "id": id,
            "shortDescription": { "text": id },
        }),
    }
}

fn sarif_result(row: &VulnerabilityRow) -> serde_json::Value {
    let level = row.severity.map(|s| s.sarif_level()).unwrap_or("warning");
    json!({
        "ruleId": row.vuln_id,
        "level": level,
        "message": {
            "text": format!("{}: {}", row.title, row.artifact),
        },
        "locations": [{
            "logicalLocations": [{
                "name": row.node_key,
                "fullyQualifiedName": format!("{}/{}", row.node_kind.label(), row.node_key),
                "kind": row.technology,
            }]
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::test_support::inventory;
    use crate::schema::JenkinsServer;

    #[test]
    fn test_sarif_output_is_valid() {
        let mut inv = inventory();
        let server = inv
            .upsert_record(&JenkinsServer {
                url: "http://jenkins.local".into(),
                https_enabled: false,
                version: String::new(),
            })
            .unwrap();
        inv.record(server, "JNK003", "http://jenkins.local").unwrap();
        inv.record(server, "JNK010", "no crumb issuer").unwrap();

        let sarif = to_sarif(&ScanReport::build(&inv).unwrap());
        assert_eq!(sarif["version"], "2.1.0");
        let run = &sarif["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "cicdguard");
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);
        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["ruleId"], "JNK003");
        assert_eq!(
            results[0]["locations"][0]["logicalLocations"][0]["fullyQualifiedName"],
            "Jenkins_Server/http://jenkins.local"
        );
    }
}
