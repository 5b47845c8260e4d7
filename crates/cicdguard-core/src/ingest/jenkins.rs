use super::{IngestOptions, IngestReport, Ingestor};
use crate::error::GuardResult;
use crate::graph::NodeHandle;
use crate::inventory::Inventory;
use crate::rules::jenkins as rules;
use crate::schema::{GithubOrganization, GithubRepository, JenkinsBuild, Relation};
use crate::snapshot::{JenkinsSnapshot, JobSnapshot};
use crate::store::GraphStore;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

static GITHUB_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[:/]([A-Za-z0-9][\w.-]*)/([\w.-]+)").expect("github reference pattern")
});

/// `(organization, repository)` pairs cloned or fetched in a build log.
pub fn github_references(output: &str) -> Vec<(String, String)> {
    let mut refs: Vec<(String, String)> = Vec::new();
    for caps in GITHUB_REF_RE.captures_iter(output) {
        let org = caps[1].to_string();
        let repo = caps[2].trim_end_matches('.');
        let repo = repo.strip_suffix(".git").unwrap_or(repo).to_string();
        if repo.is_empty() {
            continue;
        }
        if !refs.iter().any(|(o, r)| *o == org && *r == repo) {
            refs.push((org, repo));
        }
    }
    refs
}

/// Ingest one Jenkins controller scan.
pub fn ingest_jenkins<S: GraphStore>(
    inventory: &mut Inventory<S>,
    snapshot: &JenkinsSnapshot,
    options: IngestOptions,
) -> GuardResult<IngestReport> {
    let mut ingestor = Ingestor::new(inventory, options);
    info!(server = %snapshot.server.url, "Ingesting Jenkins scan");

    let server = ingestor.upsert(&snapshot.server)?;
    ingestor.apply(rules::evaluate_server(&snapshot.server, snapshot.probe.as_ref()))?;

    for job in &snapshot.jobs {
        let result = ingestor.job(server, job);
        ingestor.skip_recoverable(&format!("job '{}'", job.job.name), result)?;
    }

    for user in &snapshot.users {
        let result = ingestor
            .upsert(user)
            .and_then(|node| ingestor.connect(server, Relation::Has, node));
        ingestor.skip_recoverable(&format!("user '{}'", user.username), result)?;
    }

    for plugin in &snapshot.plugins {
        let result = ingestor
            .upsert(plugin)
            .and_then(|node| ingestor.connect(server, Relation::Contains, node))
            .and_then(|_| ingestor.apply(rules::evaluate_plugin(plugin)));
        ingestor.skip_recoverable(&format!("plugin '{}'", plugin.name), result)?;
    }

    Ok(ingestor.finish())
}

impl<S: GraphStore> Ingestor<'_, S> {
    fn job(&mut self, server: NodeHandle, snapshot: &JobSnapshot) -> GuardResult<()> {
        let job = self.upsert(&snapshot.job)?;
        self.connect(server, Relation::Executes, job)?;

        for build in &snapshot.builds {
            let node = self.upsert(build)?;
            self.connect(job, Relation::Build, node)?;
            self.build_references(node, build)?;
        }

        for agent in &snapshot.agents {
            let node = self.upsert(agent)?;
            self.connect(node, Relation::Runs, job)?;
        }
        Ok(())
    }

    /// Link a build to the GitHub repositories its log checks out. Unknown
    /// repositories get a placeholder node with unknown visibility.
    fn build_references(&mut self, build: NodeHandle, record: &JenkinsBuild) -> GuardResult<()> {
        for (org_name, repo_name) in github_references(&record.output) {
            debug!(build = %record.name, org = %org_name, repo = %repo_name, "Build references repository");
            let repo = self.ensure(&GithubRepository {
                name: repo_name,
                ..Default::default()
            })?;
            let org = self.ensure(&GithubOrganization {
                name: org_name,
                two_factor_enabled: false,
            })?;
            self.connect(org, Relation::PartOf, repo)?;
            self.connect(build, Relation::Reference, repo)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::test_support::inventory;
    use crate::schema::NodeKind;

    #[test]
    fn test_github_references_from_build_log() {
        let log = "Cloning repository https://github.com/acme/api.git\n\
                   > git fetch --tags --progress git@github.com:acme/infrastructure.git\n\
                   Checking out https://github.com/acme/api.git again.";
        assert_eq!(
            github_references(log),
            vec![
                ("acme".to_string(), "api".to_string()),
                ("acme".to_string(), "infrastructure".to_string()),
            ]
        );
        assert!(github_references("Building locally").is_empty());
    }

    #[test]
    fn test_snapshot_without_unauthenticated_checks() {
        let json = r#"{
            "server": {"url": "http://jenkins.local", "https_enabled": false, "version": "2.401"},
            "users": [
                {"username": "", "user_url": "", "project_name": "", "project_url": ""},
                {"username": "admin", "user_url": "http://jenkins.local/user/admin",
                 "project_name": "", "project_url": ""}
            ]
        }"#;
        let snapshot: JenkinsSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.probe.is_none());

        let mut inv = inventory();
        let report = ingest_jenkins(&mut inv, &snapshot, IngestOptions::default()).unwrap();

        assert_eq!(report.skipped, 1);
        assert!(report.problems[0].contains("user ''"));
        assert!(report.problems[0].contains("Jenkins_User"));

        let server = inv.find(NodeKind::JenkinsServer, "http://jenkins.local").unwrap().unwrap();
        let ids: Vec<String> = inv
            .list_findings(server)
            .unwrap()
            .into_iter()
            .map(|f| f.vuln_id)
            .collect();
        assert_eq!(ids, vec!["JNK003"]);
        assert_eq!(inv.neighbors(server, Relation::Has).unwrap()[0].key, "admin");
    }
}
