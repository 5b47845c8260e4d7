use super::{RuleFinding, RuleTarget};
use crate::schema::{JenkinsPlugin, JenkinsServer, NodeKind};
use crate::snapshot::JenkinsProbe;

pub fn is_https(url: &str) -> bool {
    url.trim().to_ascii_lowercase().starts_with("https://")
}

/// Server-wide checks: JNK003, JNK005 and JNK010. Without unauthenticated
/// check results only the HTTPS check runs.
pub fn evaluate_server(server: &JenkinsServer, checks: Option<&JenkinsProbe>) -> Vec<RuleFinding> {
    let target = RuleTarget::new(NodeKind::JenkinsServer, server.url.as_str());
    let mut findings = Vec::new();

    if !is_https(&server.url) {
        findings.push(RuleFinding::new(target.clone(), "JNK003", server.url.as_str()));
    }
    let Some(checks) = checks else {
        return findings;
    };
    if checks.anonymous_read {
        findings.push(RuleFinding::new(
            target.clone(),
            "JNK005",
            format!("{}/api/json readable without credentials", server.url.trim_end_matches('/')),
        ));
    }
    if !checks.crumb_issuer {
        findings.push(RuleFinding::new(target, "JNK010", "no crumb issuer"));
    }

    findings
}

/// JNK002: installed version differs from the update-center version.
/// Plugins without a known available version are not judged.
pub fn evaluate_plugin(plugin: &JenkinsPlugin) -> Vec<RuleFinding> {
    let available = plugin.available_version.trim();
    if available.is_empty() || available == plugin.installed_version.trim() {
        return Vec::new();
    }
    vec![RuleFinding::new(
        RuleTarget::new(NodeKind::JenkinsPlugin, plugin.name.as_str()),
        "JNK002",
        format!(
            "Installed: {} & Available: {} For: {}",
            plugin.installed_version, plugin.available_version, plugin.url
        ),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(url: &str) -> JenkinsServer {
        JenkinsServer {
            url: url.into(),
            https_enabled: is_https(url),
            version: "2.440.1".into(),
        }
    }

    #[test]
    fn test_plain_http_server() {
        let probe = JenkinsProbe {
            anonymous_read: false,
            crumb_issuer: true,
        };
        let findings = evaluate_server(&server("http://ci.local:8080"), Some(&probe));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].vuln_id, "JNK003");
        assert_eq!(findings[0].evidence, "http://ci.local:8080");
    }

    #[test]
    fn test_open_server() {
        let probe = JenkinsProbe {
            anonymous_read: true,
            crumb_issuer: false,
        };
        let findings = evaluate_server(&server("https://ci.example.com/"), Some(&probe));
        let ids: Vec<&str> = findings.iter().map(|f| f.vuln_id.as_str()).collect();
        assert_eq!(ids, vec!["JNK005", "JNK010"]);
        assert_eq!(
            findings[0].evidence,
            "https://ci.example.com/api/json readable without credentials"
        );
    }

    #[test]
    fn test_without_unauthenticated_checks_only_https_is_checked() {
        let findings = evaluate_server(&server("http://ci.local:8080"), None);
        let ids: Vec<&str> = findings.iter().map(|f| f.vuln_id.as_str()).collect();
        assert_eq!(ids, vec!["JNK003"]);
        assert!(evaluate_server(&server("https://ci.example.com"), None).is_empty());
    }

    #[test]
    fn test_outdated_plugin() {
        let mut plugin = JenkinsPlugin {
            name: "git".into(),
            installed_version: "5.2.0".into(),
            available_version: "5.2.1".into(),
            url: "https://plugins.jenkins.io/git".into(),
            enabled: true,
            has_update: true,
        };
        let findings = evaluate_plugin(&plugin);
        assert_eq!(
            findings[0].evidence,
            "Installed: 5.2.0 & Available: 5.2.1 For: https://plugins.jenkins.io/git"
        );

        plugin.available_version = "5.2.0".into();
        assert!(evaluate_plugin(&plugin).is_empty());
        plugin.available_version = String::new();
        assert!(evaluate_plugin(&plugin).is_empty());
    }
}
