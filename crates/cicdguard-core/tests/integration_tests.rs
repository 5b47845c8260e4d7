use cicdguard_core::ingest::{self, IngestOptions};
use cicdguard_core::parser::{WorkflowDoc, WorkflowParser};
use cicdguard_core::report::{self, vulnerability_rows};
use cicdguard_core::schema::{
    GithubOrganization, GithubRepository, JfrogGroup, JfrogServer, JfrogUser, Visibility,
};
use cicdguard_core::snapshot::{GroupSnapshot, JenkinsSnapshot, JfrogSnapshot};
use cicdguard_core::{
    GraphStore, Inventory, LedgerEntry, MemoryStore, NodeKind, OpenStore, Platform, Relation,
    SqliteStore,
};
use std::path::{Path, PathBuf};

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of cicdguard-core).
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .parent()
        .unwrap() // crates/
        .parent()
        .unwrap() // workspace root
        .join("tests/fixtures")
}

fn github_fixture(name: &str) -> PathBuf {
    fixtures_dir().join("github-actions").join(name)
}

fn workflow(name: &str) -> WorkflowDoc {
    WorkflowParser::parse_file(&github_fixture(name)).unwrap()
}

fn acme() -> GithubOrganization {
    GithubOrganization {
        name: "acme".into(),
        two_factor_enabled: true,
    }
}

fn repository(name: &str, visibility: Visibility) -> GithubRepository {
    GithubRepository {
        name: name.into(),
        visibility,
        ..Default::default()
    }
}

fn findings<S: GraphStore>(inv: &Inventory<S>, kind: NodeKind, key: &str) -> Vec<LedgerEntry> {
    let handle = inv.find(kind, key).unwrap().expect("node exists");
    inv.list_findings(handle).unwrap()
}

fn total_findings<S: GraphStore>(inv: &Inventory<S>) -> usize {
    vulnerability_rows(inv).unwrap().len()
}

#[test]
fn test_public_repo_with_self_hosted_unpinned_workflow() {
    let mut inv = Inventory::new(MemoryStore::new());
    let docs = vec![workflow("self-hosted-unpinned.yml")];

    ingest::ingest_workflows(
        &mut inv,
        Some(&acme()),
        &repository("api", Visibility::Public),
        &docs,
        IngestOptions::default(),
    )
    .unwrap();

    for kind in [
        NodeKind::GithubOrganization,
        NodeKind::GithubRepository,
        NodeKind::ActionWorkflow,
        NodeKind::ActionJob,
        NodeKind::ActionRunner,
        NodeKind::ActionStep,
        NodeKind::ActionAction,
    ] {
        assert_eq!(inv.count(kind).unwrap(), 1, "{kind} count");
    }
    assert_eq!(inv.count(NodeKind::ActionCommand).unwrap(), 0);

    let org = inv.find(NodeKind::GithubOrganization, "acme").unwrap().unwrap();
    let repo = inv.find(NodeKind::GithubRepository, "api").unwrap().unwrap();
    let wf = inv.find(NodeKind::ActionWorkflow, "release").unwrap().unwrap();
    let job = inv.find(NodeKind::ActionJob, "deploy").unwrap().unwrap();
    let runner = inv
        .find(NodeKind::ActionRunner, "self-hosted,linux")
        .unwrap()
        .unwrap();
    let step = inv
        .find(NodeKind::ActionStep, "actions/checkout@master")
        .unwrap()
        .unwrap();
    let action = inv
        .find(NodeKind::ActionAction, "actions/checkout@master")
        .unwrap()
        .unwrap();

    assert_eq!(inv.neighbors(org, Relation::PartOf).unwrap()[0].id, repo.id);
    assert_eq!(inv.neighbors(wf, Relation::Contains).unwrap()[0].id, repo.id);
    assert_eq!(inv.neighbors(job, Relation::Have).unwrap()[0].id, wf.id);
    assert_eq!(inv.neighbors(runner, Relation::RunsOn).unwrap()[0].id, job.id);
    assert_eq!(inv.neighbors(step, Relation::Executes).unwrap()[0].id, job.id);
    assert_eq!(inv.neighbors(action, Relation::Uses).unwrap()[0].id, step.id);

    assert_eq!(
        findings(&inv, NodeKind::ActionWorkflow, "release"),
        vec![LedgerEntry::new("SIA004", "deploy runs on self-hosted,linux")]
    );
    assert_eq!(
        findings(&inv, NodeKind::ActionAction, "actions/checkout@master"),
        vec![LedgerEntry::new("SIA005", "actions/checkout@master")]
    );
    assert_eq!(total_findings(&inv), 2);
}

#[test]
fn test_private_repo_runner_rules() {
    let mut inv = Inventory::new(MemoryStore::new());
    let docs = vec![workflow("mixed-runners.yml"), workflow("issue-triage.yml")];

    ingest::ingest_workflows(
        &mut inv,
        None,
        &repository("payments", Visibility::Private),
        &docs,
        IngestOptions::default(),
    )
    .unwrap();

    // Mixed runners in a private repository.
    let build = findings(&inv, NodeKind::ActionWorkflow, "build");
    assert!(build.contains(&LedgerEntry::new("SIA003", "not self-hosted: lint")));
    assert!(build.iter().all(|f| f.vuln_id != "SIA004"));

    // Every job self-hosted: nothing to report about runners.
    let triage = findings(&inv, NodeKind::ActionWorkflow, "Issue triage");
    assert!(triage.iter().all(|f| f.vuln_id != "SIA003"));
    assert!(triage.contains(&LedgerEntry::new(
        "SIA002",
        "${{ github.event.issue.title }}"
    )));
    assert_eq!(triage.iter().filter(|f| f.vuln_id == "SIA002").count(), 1);
}

#[test]
fn test_unpinned_and_local_actions() {
    let mut inv = Inventory::new(MemoryStore::new());
    let docs = vec![workflow("mixed-runners.yml")];
    ingest::ingest_workflows(
        &mut inv,
        None,
        &repository("web", Visibility::Public),
        &docs,
        IngestOptions::default(),
    )
    .unwrap();

    assert_eq!(
        findings(&inv, NodeKind::ActionAction, "actions/setup-node"),
        vec![LedgerEntry::new("SIA005", "actions/setup-node")]
    );
    assert!(findings(&inv, NodeKind::ActionAction, "actions/checkout@v4").is_empty());
    assert!(findings(&inv, NodeKind::ActionAction, "./.github/actions/package").is_empty());
    // First job is GitHub-hosted, so the public self-hosted rule stays quiet.
    assert!(findings(&inv, NodeKind::ActionWorkflow, "build").is_empty());
    assert_eq!(inv.count(NodeKind::ActionCommand).unwrap(), 1);
}

#[test]
fn test_workflow_without_jobs_is_rejected() {
    let err = WorkflowParser::parse_file(&github_fixture("no-jobs.yml")).unwrap_err();
    assert!(err.to_string().contains("jobs"));
}

#[test]
fn test_rescan_is_idempotent() {
    let mut inv = Inventory::new(MemoryStore::new());
    let docs = vec![workflow("self-hosted-unpinned.yml")];
    let repo = repository("api", Visibility::Public);

    for _ in 0..3 {
        ingest::ingest_workflows(&mut inv, Some(&acme()), &repo, &docs, IngestOptions::default())
            .unwrap();
    }

    assert_eq!(inv.count(NodeKind::ActionWorkflow).unwrap(), 1);
    assert_eq!(inv.edges().unwrap().len(), 6);
    assert_eq!(total_findings(&inv), 2);
}

#[test]
fn test_sqlite_inventory_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested/inventory.db");

    {
        let mut inv = Inventory::new(SqliteStore::open(&db).unwrap());
        let docs = vec![workflow("self-hosted-unpinned.yml")];
        ingest::ingest_workflows(
            &mut inv,
            Some(&acme()),
            &repository("api", Visibility::Public),
            &docs,
            IngestOptions::default(),
        )
        .unwrap();
    }

    let inv = Inventory::new(SqliteStore::open(&db).unwrap());
    assert_eq!(inv.count(NodeKind::ActionStep).unwrap(), 1);
    assert_eq!(inv.edges().unwrap().len(), 6);
    assert_eq!(
        findings(&inv, NodeKind::ActionWorkflow, "release"),
        vec![LedgerEntry::new("SIA004", "deploy runs on self-hosted,linux")]
    );

    let repo: GithubRepository = inv
        .record_of(inv.find(NodeKind::GithubRepository, "api").unwrap().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(repo.visibility, Visibility::Public);
}

#[test]
fn test_reset_platform_removes_nodes_and_edges() {
    let mut inv = Inventory::new(SqliteStore::open_in_memory().unwrap());
    let docs = vec![workflow("self-hosted-unpinned.yml")];
    ingest::ingest_workflows(
        &mut inv,
        Some(&acme()),
        &repository("api", Visibility::Public),
        &docs,
        IngestOptions::default(),
    )
    .unwrap();
    ingest::ingest_jfrog(&mut inv, &jfrog_snapshot(), IngestOptions::default()).unwrap();

    let removed = inv.reset_platform(Platform::GitHub).unwrap();
    assert_eq!(removed, 7);
    assert_eq!(inv.count(NodeKind::ActionWorkflow).unwrap(), 0);
    // JFrog data is untouched: server HAS group, group PART_OF user.
    assert_eq!(inv.count(NodeKind::JfrogServer).unwrap(), 1);
    assert_eq!(inv.edges().unwrap().len(), 2);
}

#[test]
fn test_jenkins_snapshot_ingestion() {
    let raw = std::fs::read_to_string(fixtures_dir().join("snapshots/jenkins.json")).unwrap();
    let snapshot: JenkinsSnapshot = serde_json::from_str(&raw).unwrap();
    let mut inv = Inventory::new(MemoryStore::new());

    let summary = ingest::ingest_jenkins(&mut inv, &snapshot, IngestOptions::default()).unwrap();
    assert_eq!(summary.findings_recorded, 4);

    let server = findings(&inv, NodeKind::JenkinsServer, "http://jenkins.acme.local");
    let ids: Vec<&str> = server.iter().map(|f| f.vuln_id.as_str()).collect();
    assert_eq!(ids, vec!["JNK003", "JNK005", "JNK010"]);

    assert_eq!(
        findings(&inv, NodeKind::JenkinsPlugin, "git"),
        vec![LedgerEntry::new(
            "JNK002",
            "Installed: 5.2.0 & Available: 5.2.1 For: https://plugins.jenkins.io/git"
        )]
    );
    assert!(findings(&inv, NodeKind::JenkinsPlugin, "credentials").is_empty());

    // The build log links the build to a placeholder repository.
    let build = inv.find(NodeKind::JenkinsBuild, "api-deploy #12").unwrap().unwrap();
    let referenced = inv.neighbors(build, Relation::Reference).unwrap();
    assert_eq!(referenced.len(), 1);
    assert_eq!(referenced[0].key, "api");
    let org = inv.find(NodeKind::GithubOrganization, "acme").unwrap().unwrap();
    assert_eq!(inv.neighbors(org, Relation::PartOf).unwrap().len(), 1);

    let agent = inv.find(NodeKind::JenkinsNode, "linux-agent-1").unwrap().unwrap();
    assert_eq!(inv.neighbors(agent, Relation::Runs).unwrap()[0].key, "api-deploy");
    assert_eq!(inv.count(NodeKind::JenkinsUser).unwrap(), 1);
}

#[test]
fn test_placeholder_repository_keeps_scanned_visibility() {
    let mut inv = Inventory::new(MemoryStore::new());
    ingest::ingest_workflows(
        &mut inv,
        Some(&acme()),
        &repository("api", Visibility::Private),
        &[],
        IngestOptions::default(),
    )
    .unwrap();

    let raw = std::fs::read_to_string(fixtures_dir().join("snapshots/jenkins.json")).unwrap();
    let snapshot: JenkinsSnapshot = serde_json::from_str(&raw).unwrap();
    ingest::ingest_jenkins(&mut inv, &snapshot, IngestOptions::default()).unwrap();

    let handle = inv.find(NodeKind::GithubRepository, "api").unwrap().unwrap();
    let repo: GithubRepository = inv.record_of(handle).unwrap().unwrap();
    assert_eq!(repo.visibility, Visibility::Private);
    assert_eq!(inv.count(NodeKind::GithubRepository).unwrap(), 1);
}

fn jfrog_snapshot() -> JfrogSnapshot {
    JfrogSnapshot {
        server: JfrogServer {
            url: "http://artifacts.acme.local".into(),
            https_enabled: false,
        },
        anonymous_read: false,
        groups: vec![GroupSnapshot {
            group: JfrogGroup {
                name: "deployers".into(),
                description: "CI deployers".into(),
                admin_privileges: false,
                realm: "internal".into(),
            },
            members: vec![JfrogUser {
                name: "ci-bot".into(),
                email: "ci@acme.io".into(),
                is_admin: false,
                realm: "internal".into(),
                status: "enabled".into(),
            }],
        }],
    }
}

#[test]
fn test_jfrog_ingestion_and_reports() {
    let mut inv = Inventory::new(MemoryStore::new());
    ingest::ingest_jfrog(&mut inv, &jfrog_snapshot(), IngestOptions::default()).unwrap();

    let group = inv.find(NodeKind::JfrogGroup, "deployers").unwrap().unwrap();
    assert_eq!(inv.neighbors(group, Relation::PartOf).unwrap()[0].key, "ci-bot");

    let rows = vulnerability_rows(&inv).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vuln_id, "JFG003");
    assert_eq!(rows[0].technology, "JFrog Server");
    assert_eq!(
        rows[0].artifact,
        "http://artifacts.acme.local http://artifacts.acme.local"
    );

    let dot = report::to_dot(&inv).unwrap();
    assert!(dot.contains("[label=\"HAS\"]"));
    assert!(dot.contains("[label=\"PART_OF\"]"));
}
