use crate::schema::{GithubOrganization, GithubRepository, GithubTeam, GithubUser};
use serde::{Deserialize, Serialize};

/// A workflow file as fetched from the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSource {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub team: GithubTeam,
    pub repositories: Vec<GithubRepository>,
    pub members: Vec<GithubUser>,
}

/// Repository `actions/permissions/workflow` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPermissions {
    pub default_workflow_permissions: String,
    #[serde(default)]
    pub can_approve_pull_request_reviews: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedActions {
    All,
    LocalOnly,
    Selected,
}

impl AllowedActions {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowedActions::All => "all",
            AllowedActions::LocalOnly => "local_only",
            AllowedActions::Selected => "selected",
        }
    }
}

/// The allow-list behind `allowed_actions: selected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedActions {
    #[serde(default)]
    pub github_owned_allowed: bool,
    #[serde(default)]
    pub verified_allowed: bool,
    #[serde(default)]
    pub patterns_allowed: Vec<String>,
}

/// Repository `actions/permissions` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPermissions {
    pub enabled: bool,
    #[serde(default)]
    pub allowed_actions: Option<AllowedActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_actions: Option<SelectedActions>,
}

/// Everything one `github` scan fetched for an organization and repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubSnapshot {
    pub organization: GithubOrganization,
    pub repository: GithubRepository,
    #[serde(default)]
    pub workflows: Vec<WorkflowSource>,
    #[serde(default)]
    pub teams: Vec<TeamSnapshot>,
    /// `None` when the token lacks the administration scope.
    #[serde(default)]
    pub workflow_permissions: Option<WorkflowPermissions>,
    #[serde(default)]
    pub action_permissions: Option<ActionPermissions>,
}

impl GitHubSnapshot {
    pub fn new(organization: GithubOrganization, repository: GithubRepository) -> Self {
        Self {
            organization,
            repository,
            workflows: Vec::new(),
            teams: Vec::new(),
            workflow_permissions: None,
            action_permissions: None,
        }
    }
}
