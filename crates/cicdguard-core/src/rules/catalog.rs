use crate::schema::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// SARIF result level.
    pub fn sarif_level(&self) -> &'static str {
        match self {
            Severity::Critical | Severity::High => "error",
            Severity::Medium => "warning",
            Severity::Low | Severity::Info => "note",
        }
    }
}

/// One entry of the vulnerability catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VulnRule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub platform: Platform,
    pub further_read: &'static str,
}

const GITHUB_HARDENING: &str =
    "https://docs.github.com/en/actions/security-guides/security-hardening-for-github-actions";
const GITHUB_ACTIONS_SETTINGS: &str = "https://docs.github.com/en/repositories/managing-your-repositorys-settings-and-features/enabling-features-for-your-repository/managing-github-actions-settings-for-a-repository";

pub const CATALOG: &[VulnRule] = &[
    VulnRule {
        id: "SIA002",
        title: "Expression injection in run step",
        description: "A run step interpolates ${{ }} expressions directly into the shell script. Attacker-controlled event data can inject commands.",
        severity: Severity::High,
        platform: Platform::GitHub,
        further_read: GITHUB_HARDENING,
    },
    VulnRule {
        id: "SIA003",
        title: "Private repository not fully on self-hosted runners",
        description: "Jobs of a private repository run on GitHub-hosted runners, outside the organization's network controls.",
        severity: Severity::Medium,
        platform: Platform::GitHub,
        further_read: "https://docs.github.com/en/actions/using-github-hosted-runners/about-github-hosted-runners",
    },
    VulnRule {
        id: "SIA004",
        title: "Self-hosted runner used by a public repository",
        description: "A public repository runs jobs on self-hosted runners. Pull requests from forks can execute code on the runner host.",
        severity: Severity::Critical,
        platform: Platform::GitHub,
        further_read: "https://docs.github.com/en/actions/hosting-your-own-runners/managing-self-hosted-runners/about-self-hosted-runners#self-hosted-runner-security",
    },
    VulnRule {
        id: "SIA005",
        title: "Unpinned action reference",
        description: "An action is referenced without a version or by a mutable branch. The action maintainer can change the code that runs.",
        severity: Severity::High,
        platform: Platform::GitHub,
        further_read: "https://docs.github.com/en/actions/security-guides/security-hardening-for-github-actions#using-third-party-actions",
    },
    VulnRule {
        id: "SIA011",
        title: "Actions may approve pull requests",
        description: "The GITHUB_TOKEN is allowed to create and approve pull request reviews, which can bypass required reviews.",
        severity: Severity::High,
        platform: Platform::GitHub,
        further_read: GITHUB_ACTIONS_SETTINGS,
    },
    VulnRule {
        id: "SIA015",
        title: "Unrestricted actions policy",
        description: "The repository allows all actions, or a selected list that should be reviewed.",
        severity: Severity::Medium,
        platform: Platform::GitHub,
        further_read: GITHUB_ACTIONS_SETTINGS,
    },
    VulnRule {
        id: "SIA016",
        title: "Write-all default token permissions",
        description: "Workflows receive a GITHUB_TOKEN with write access to the repository by default.",
        severity: Severity::High,
        platform: Platform::GitHub,
        further_read: "https://docs.github.com/en/actions/security-guides/automatic-token-authentication#permissions-for-the-github_token",
    },
    VulnRule {
        id: "JNK002",
        title: "Outdated Jenkins plugin",
        description: "The installed plugin version differs from the version offered by the update center.",
        severity: Severity::Medium,
        platform: Platform::Jenkins,
        further_read: "https://www.jenkins.io/security/advisories/",
    },
    VulnRule {
        id: "JNK003",
        title: "Jenkins served over plain HTTP",
        description: "The Jenkins base URL does not use HTTPS. Credentials and session cookies travel in clear text.",
        severity: Severity::High,
        platform: Platform::Jenkins,
        further_read: "https://www.jenkins.io/doc/book/installing/initial-settings/",
    },
    VulnRule {
        id: "JNK005",
        title: "Anonymous read access to Jenkins",
        description: "The Jenkins API answered an unauthenticated request.",
        severity: Severity::High,
        platform: Platform::Jenkins,
        further_read: "https://www.jenkins.io/doc/book/security/access-control/",
    },
    VulnRule {
        id: "JNK010",
        title: "CSRF protection disabled",
        description: "Jenkins does not issue CSRF crumbs.",
        severity: Severity::Medium,
        platform: Platform::Jenkins,
        further_read: "https://www.jenkins.io/doc/book/security/csrf-protection/",
    },
    VulnRule {
        id: "JFG003",
        title: "JFrog served over plain HTTP",
        description: "The JFrog platform URL does not use HTTPS.",
        severity: Severity::High,
        platform: Platform::Jfrog,
        further_read: "https://jfrog.com/help/r/jfrog-installation-setup-documentation/configure-tls-certificates",
    },
    VulnRule {
        id: "JFG005",
        title: "Anonymous access to JFrog",
        description: "The JFrog platform answered an unauthenticated request.",
        severity: Severity::High,
        platform: Platform::Jfrog,
        further_read: "https://jfrog.com/help/r/jfrog-platform-administration-documentation/allow-anonymous-access",
    },
];

pub fn lookup(id: &str) -> Option<&'static VulnRule> {
    CATALOG.iter().find(|rule| rule.id == id)
}
