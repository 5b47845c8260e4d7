use super::jenkins::is_https;
use super::{RuleFinding, RuleTarget};
use crate::schema::{JfrogServer, NodeKind};

/// Repository listing requested without credentials to detect anonymous access.
pub const ANONYMOUS_PROBE_PATH: &str = "artifactory/api/repositories";

/// JFG003 (no HTTPS) and JFG005 (anonymous access).
pub fn evaluate_server(server: &JfrogServer, anonymous_read: bool) -> Vec<RuleFinding> {
    let target = RuleTarget::new(NodeKind::JfrogServer, server.url.as_str());
    let mut findings = Vec::new();

    if !is_https(&server.url) {
        findings.push(RuleFinding::new(target.clone(), "JFG003", server.url.as_str()));
    }
    if anonymous_read {
        findings.push(RuleFinding::new(
            target,
            "JFG005",
            format!(
                "{}/{} readable without credentials",
                server.url.trim_end_matches('/'),
                ANONYMOUS_PROBE_PATH
            ),
        ));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jfrog_server_rules() {
        let server = JfrogServer {
            url: "http://artifacts.local".into(),
            https_enabled: false,
        };
        let ids: Vec<String> = evaluate_server(&server, true)
            .into_iter()
            .map(|f| f.vuln_id)
            .collect();
        assert_eq!(ids, vec!["JFG003", "JFG005"]);

        let secure = JfrogServer {
            url: "https://acme.jfrog.io".into(),
            https_enabled: true,
        };
        assert!(evaluate_server(&secure, false).is_empty());
    }
}
