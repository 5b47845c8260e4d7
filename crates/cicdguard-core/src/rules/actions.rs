//! GitHub Actions rules: runner placement, expression injection, action
//! pinning and repository Actions policy.

use super::{dedupe, RuleFinding, RuleTarget};
use crate::parser::{WorkflowDoc, WorkflowStep};
use crate::schema::{NodeKind, Visibility};
use crate::snapshot::{ActionPermissions, AllowedActions, WorkflowPermissions};
use regex::Regex;
use std::sync::LazyLock;

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{[\w. ]*\}\}").expect("expression pattern"));
static SHA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[0-9a-f]{40}$").expect("sha pattern"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@v?\d+(\.\d+)*$").expect("tag pattern"));
static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(main|master|develop|dev|release.*|trunk|HEAD)$").expect("branch pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningRisk {
    Sha,
    Tag,
    Branch,
    /// No `@ref` at all.
    Latest,
    Unknown,
}

impl PinningRisk {
    pub fn is_mutable(&self) -> bool {
        matches!(self, PinningRisk::Branch | PinningRisk::Latest)
    }
}

pub fn classify_reference(reference: &str) -> PinningRisk {
    if SHA_RE.is_match(reference) {
        PinningRisk::Sha
    } else if TAG_RE.is_match(reference) {
        PinningRisk::Tag
    } else if BRANCH_RE.is_match(reference) {
        PinningRisk::Branch
    } else if !reference.contains('@') {
        PinningRisk::Latest
    } else {
        PinningRisk::Unknown
    }
}

/// Whether the workflow's first job runs on a self-hosted runner.
pub fn any_self_hosted(doc: &WorkflowDoc) -> bool {
    doc.jobs.first().is_some_and(|job| job.is_self_hosted())
}

/// Whether every job with a known runner runs on a self-hosted one. Jobs
/// calling a reusable workflow are left out.
pub fn all_self_hosted(doc: &WorkflowDoc) -> bool {
    hosted_jobs(doc).is_empty()
}

/// Names of jobs with a known runner that is not self-hosted.
fn hosted_jobs(doc: &WorkflowDoc) -> Vec<&str> {
    doc.jobs
        .iter()
        .filter(|job| job.has_known_runner() && !job.is_self_hosted())
        .map(|job| job.name.as_str())
        .collect()
}

/// `${{ ... }}` expressions interpolated into a step's `run:` script.
pub fn find_insecure_inputs(step: &WorkflowStep) -> Vec<&str> {
    step.run
        .as_deref()
        .map(|run| EXPRESSION_RE.find_iter(run).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}

/// Evaluate SIA002, SIA003, SIA004 and SIA005 for one workflow.
///
/// Runner rules need a known visibility; a repository seen only by
/// reference is not judged on them.
pub fn evaluate_workflow(visibility: Visibility, doc: &WorkflowDoc) -> Vec<RuleFinding> {
    let workflow = RuleTarget::new(NodeKind::ActionWorkflow, doc.name.as_str());
    let mut findings = Vec::new();

    if visibility == Visibility::Public && any_self_hosted(doc) {
        if let Some(job) = doc.jobs.first() {
            findings.push(RuleFinding::new(
                workflow.clone(),
                "SIA004",
                format!("{} runs on {}", job.name, job.runner_key()),
            ));
        }
    }

    let hosted = hosted_jobs(doc);
    if visibility.is_private() && !hosted.is_empty() {
        findings.push(RuleFinding::new(
            workflow.clone(),
            "SIA003",
            format!("not self-hosted: {}", hosted.join(", ")),
        ));
    }

    for job in &doc.jobs {
        for step in &job.steps {
            let matches = find_insecure_inputs(step);
            if !matches.is_empty() {
                findings.push(RuleFinding::new(workflow.clone(), "SIA002", matches.join(" ")));
            }

            let Some(uses) = step.uses.as_deref() else {
                continue;
            };
            if uses.starts_with("./") {
                continue;
            }
            if classify_reference(uses).is_mutable() {
                findings.push(RuleFinding::new(
                    RuleTarget::new(NodeKind::ActionAction, uses),
                    "SIA005",
                    uses,
                ));
            }
        }
    }

    dedupe(findings)
}

/// Evaluate SIA011, SIA015 and SIA016 from a repository's Actions settings.
/// Findings land on the organization; evidence names the repository.
pub fn evaluate_permissions(
    organization: &str,
    repository: &str,
    workflow: Option<&WorkflowPermissions>,
    actions: Option<&ActionPermissions>,
) -> Vec<RuleFinding> {
    let org = RuleTarget::new(NodeKind::GithubOrganization, organization);
    let mut findings = Vec::new();

    if let Some(workflow) = workflow {
        if workflow.can_approve_pull_request_reviews {
            findings.push(RuleFinding::new(
                org.clone(),
                "SIA011",
                format!("{}: can_approve_pull_request_reviews=true", repository),
            ));
        }
        if workflow.default_workflow_permissions.contains("write") {
            findings.push(RuleFinding::new(
                org.clone(),
                "SIA016",
                format!(
                    "{}: default_workflow_permissions={}",
                    repository, workflow.default_workflow_permissions
                ),
            ));
        }
    }

    if let Some(actions) = actions.filter(|a| a.enabled) {
        match actions.allowed_actions {
            Some(AllowedActions::All) => findings.push(RuleFinding::new(
                org.clone(),
                "SIA015",
                format!("{}: allowed_actions=all", repository),
            )),
            Some(AllowedActions::Selected) => {
                let patterns = actions
                    .selected_actions
                    .as_ref()
                    .map(|s| s.patterns_allowed.join(","))
                    .unwrap_or_default();
                findings.push(RuleFinding::new(
                    org.clone(),
                    "SIA015",
                    format!("{}: allowed_actions=selected [{}]", repository, patterns),
                ));
            }
            Some(AllowedActions::LocalOnly) | None => {}
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::WorkflowParser;
    use crate::snapshot::SelectedActions;

    fn parse(yaml: &str) -> WorkflowDoc {
        WorkflowParser::parse(yaml, "ci.yml".to_string()).unwrap()
    }

    fn ids(findings: &[RuleFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.vuln_id.as_str()).collect()
    }

    const SELF_HOSTED_FIRST: &str = r#"
name: ci
on: push
jobs:
  build:
    runs-on: [self-hosted, linux]
    steps:
      - run: make
  lint:
    runs-on: ubuntu-latest
    steps:
      - run: make lint
"#;

    const ALL_SELF_HOSTED: &str = r#"
name: ci
on: push
jobs:
  build:
    runs-on: [self-hosted]
    steps:
      - run: make
"#;

    #[test]
    fn test_public_repo_with_self_hosted_first_job() {
        let findings = evaluate_workflow(Visibility::Public, &parse(SELF_HOSTED_FIRST));
        assert_eq!(ids(&findings), vec!["SIA004"]);
        assert_eq!(findings[0].target, RuleTarget::new(NodeKind::ActionWorkflow, "ci"));
    }

    #[test]
    fn test_private_repo_not_all_self_hosted() {
        let findings = evaluate_workflow(Visibility::Private, &parse(SELF_HOSTED_FIRST));
        assert_eq!(ids(&findings), vec!["SIA003"]);
        assert_eq!(findings[0].evidence, "not self-hosted: lint");
    }

    #[test]
    fn test_private_repo_all_self_hosted_is_clean() {
        assert!(evaluate_workflow(Visibility::Private, &parse(ALL_SELF_HOSTED)).is_empty());
        assert!(evaluate_workflow(Visibility::Internal, &parse(ALL_SELF_HOSTED)).is_empty());
    }

    #[test]
    fn test_reusable_workflow_job_is_not_judged_on_runners() {
        let doc = parse(
            r#"
name: release
on: push
jobs:
  build:
    runs-on: [self-hosted]
    steps:
      - run: make
  publish:
    uses: acme/shared/.github/workflows/publish.yml@v1
"#,
        );
        assert!(all_self_hosted(&doc));
        assert!(evaluate_workflow(Visibility::Private, &doc).is_empty());
    }

    #[test]
    fn test_unknown_visibility_skips_runner_rules() {
        assert!(evaluate_workflow(Visibility::Unknown, &parse(SELF_HOSTED_FIRST)).is_empty());
    }

    #[test]
    fn test_unpinned_actions() {
        let doc = parse(
            r#"
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout
      - uses: actions/setup-node@master
      - uses: actions/cache@v4
      - uses: ./.github/actions/local
      - uses: docker/login-action@a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2
"#,
        );
        let findings = evaluate_workflow(Visibility::Public, &doc);
        let flagged: Vec<&str> = findings.iter().map(|f| f.target.key.as_str()).collect();
        assert_eq!(flagged, vec!["actions/checkout", "actions/setup-node@master"]);
        assert!(findings.iter().all(|f| f.vuln_id == "SIA005"));
        assert!(findings.iter().all(|f| f.target.kind == NodeKind::ActionAction));
    }

    #[test]
    fn test_classify_reference() {
        assert_eq!(classify_reference("actions/checkout@v4.1.1"), PinningRisk::Tag);
        assert_eq!(classify_reference("org/action@release/v2"), PinningRisk::Branch);
        assert_eq!(classify_reference("org/action@HEAD"), PinningRisk::Branch);
        assert_eq!(classify_reference("org/action@feature-x"), PinningRisk::Unknown);
        assert!(!PinningRisk::Unknown.is_mutable());
    }

    #[test]
    fn test_expression_injection() {
        let doc = parse(
            r#"
name: triage
on: issues
jobs:
  greet:
    runs-on: ubuntu-latest
    steps:
      - run: echo "${{ github.event.issue.title }}"
      - run: echo hello
      - run: echo "${{github.head_ref}}" "${{ github.actor }}"
"#,
        );
        let findings = evaluate_workflow(Visibility::Public, &doc);
        assert_eq!(ids(&findings), vec!["SIA002", "SIA002"]);
        assert_eq!(findings[0].evidence, "${{ github.event.issue.title }}");
        assert_eq!(findings[1].evidence, "${{github.head_ref}} ${{ github.actor }}");
    }

    #[test]
    fn test_repeated_evidence_is_reported_once() {
        let doc = parse(
            r#"
name: ci
on: push
jobs:
  a:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout
  b:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout
"#,
        );
        assert_eq!(evaluate_workflow(Visibility::Public, &doc).len(), 1);
    }

    #[test]
    fn test_repository_permissions() {
        let workflow = WorkflowPermissions {
            default_workflow_permissions: "write".into(),
            can_approve_pull_request_reviews: true,
        };
        let actions = ActionPermissions {
            enabled: true,
            allowed_actions: Some(AllowedActions::Selected),
            selected_actions: Some(SelectedActions {
                patterns_allowed: vec!["acme/*".into()],
                ..Default::default()
            }),
        };
        let findings = evaluate_permissions("acme", "api", Some(&workflow), Some(&actions));
        assert_eq!(ids(&findings), vec!["SIA011", "SIA016", "SIA015"]);
        assert_eq!(findings[2].evidence, "api: allowed_actions=selected [acme/*]");
        assert!(findings
            .iter()
            .all(|f| f.target == RuleTarget::new(NodeKind::GithubOrganization, "acme")));
    }

    #[test]
    fn test_restrictive_permissions_are_clean() {
        let workflow = WorkflowPermissions {
            default_workflow_permissions: "read".into(),
            can_approve_pull_request_reviews: false,
        };
        let actions = ActionPermissions {
            enabled: true,
            allowed_actions: Some(AllowedActions::LocalOnly),
            selected_actions: None,
        };
        assert!(evaluate_permissions("acme", "api", Some(&workflow), Some(&actions)).is_empty());
        assert!(evaluate_permissions("acme", "api", None, None).is_empty());
    }
}
