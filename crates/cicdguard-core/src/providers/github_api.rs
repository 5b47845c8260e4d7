use super::{build_client, join_url};
use crate::config::GuardConfig;
use crate::schema::{GithubOrganization, GithubRepository, GithubTeam, GithubUser, Visibility};
use crate::snapshot::{
    ActionPermissions, GitHubSnapshot, SelectedActions, TeamSnapshot, WorkflowPermissions,
    WorkflowSource,
};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

const WORKFLOW_DIR: &str = ".github/workflows";

/// GitHub REST client for organization, repository and Actions settings.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    team_repo_limit: usize,
    team_member_limit: usize,
}

#[derive(Debug, Deserialize)]
struct OrgPayload {
    login: String,
    #[serde(default)]
    two_factor_requirement_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    name: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    visibility: Option<String>,
}

impl RepoPayload {
    fn visibility(&self) -> Visibility {
        match self.visibility.as_deref() {
            Some("public") => Visibility::Public,
            Some("private") => Visibility::Private,
            Some("internal") => Visibility::Internal,
            _ if self.private => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TeamPayload {
    name: String,
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permission: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    login: String,
    #[serde(rename = "type", default)]
    user_type: String,
    #[serde(default)]
    site_admin: bool,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembershipPayload {
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
struct ActionPermissionsPayload {
    #[serde(flatten)]
    permissions: ActionPermissions,
    #[serde(default)]
    selected_actions_url: Option<String>,
}

pub(crate) fn is_workflow_file(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

impl GitHubClient {
    pub fn new(config: &GuardConfig) -> Result<Self> {
        let token = config.github_token()?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).context("Invalid GitHub token")?,
        );

        Ok(Self {
            client: build_client(headers)?,
            base_url: config.github.api_url.clone(),
            team_repo_limit: config.scan.team_repo_limit,
            team_member_limit: config.scan.team_member_limit,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = join_url(&self.base_url, path);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?
            .error_for_status()
            .context("GitHub API returned error")?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    /// Like `get_json`, but a 404 means the resource is absent.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = join_url(&self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .error_for_status()
            .context("GitHub API returned error")?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))?;
        Ok(Some(body))
    }

    /// Whether an endpoint answers for this repository. Disabled security
    /// features answer 404.
    async fn feature_enabled(&self, path: &str) -> Result<bool> {
        let url = join_url(&self.base_url, path);
        let status = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?
            .status();
        Ok(feature_state(path, status))
    }

    pub async fn fetch_organization(&self, org: &str) -> Result<GithubOrganization> {
        let payload: OrgPayload = self
            .get_json(&format!("orgs/{}", org))
            .await
            .with_context(|| format!("Failed to fetch organization '{}'", org))?;
        Ok(GithubOrganization {
            name: payload.login,
            two_factor_enabled: payload.two_factor_requirement_enabled.unwrap_or(false),
        })
    }

    async fn dependabot_enabled(&self, owner: &str, repo: &str) -> bool {
        match self
            .feature_enabled(&format!("repos/{}/{}/vulnerability-alerts", owner, repo))
            .await
        {
            Ok(enabled) => enabled,
            Err(err) => {
                warn!(repo, error = %format!("{:#}", err), "Could not read Dependabot alerts setting");
                false
            }
        }
    }

    /// Repository with its security feature flags.
    pub async fn fetch_repository(&self, owner: &str, repo: &str) -> Result<GithubRepository> {
        let payload: RepoPayload = self
            .get_json(&format!("repos/{}/{}", owner, repo))
            .await
            .with_context(|| format!("Failed to fetch repository '{}/{}'", owner, repo))?;

        let secret_scanning_enabled = self
            .feature_enabled(&format!("repos/{}/{}/secret-scanning/alerts?per_page=1", owner, repo))
            .await?;
        let code_scanning_enabled = self
            .feature_enabled(&format!("repos/{}/{}/code-scanning/alerts?per_page=1", owner, repo))
            .await?;

        Ok(GithubRepository {
            visibility: payload.visibility(),
            dependabot_enabled: self.dependabot_enabled(owner, repo).await,
            secret_scanning_enabled,
            code_scanning_enabled,
            name: payload.name,
        })
    }

    /// Every `.yml`/`.yaml` file under `.github/workflows`.
    pub async fn fetch_workflows(&self, owner: &str, repo: &str) -> Result<Vec<WorkflowSource>> {
        let listing: Option<Vec<ContentEntry>> = self
            .get_optional(&format!("repos/{}/{}/contents/{}", owner, repo, WORKFLOW_DIR))
            .await?;

        let mut workflows = Vec::new();
        for entry in listing.unwrap_or_default() {
            if entry.kind != "file" || !is_workflow_file(&entry.name) {
                continue;
            }
            let url = join_url(
                &self.base_url,
                &format!("repos/{}/{}/contents/{}", owner, repo, entry.path),
            );
            let content = self
                .client
                .get(&url)
                .header(ACCEPT, "application/vnd.github.raw+json")
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match content {
                Ok(response) => match response.text().await {
                    Ok(content) => workflows.push(WorkflowSource {
                        path: entry.path,
                        content,
                    }),
                    Err(err) => warn!(path = %entry.path, error = %err, "Could not read workflow"),
                },
                Err(err) => warn!(path = %entry.path, error = %err, "Could not fetch workflow"),
            }
        }
        Ok(workflows)
    }

    async fn fetch_member(&self, org: &str, team_slug: &str, member: MemberPayload) -> GithubUser {
        let email = match self.get_json::<UserPayload>(&format!("users/{}", member.login)).await {
            Ok(user) => user.email.unwrap_or_default(),
            Err(err) => {
                warn!(user = %member.login, error = %format!("{:#}", err), "Could not fetch user profile");
                String::new()
            }
        };
        let role = match self
            .get_json::<MembershipPayload>(&format!(
                "orgs/{}/teams/{}/memberships/{}",
                org, team_slug, member.login
            ))
            .await
        {
            Ok(membership) => membership.role,
            Err(err) => {
                warn!(user = %member.login, error = %format!("{:#}", err), "Could not fetch team membership");
                String::new()
            }
        };

        GithubUser {
            name: member.login,
            email,
            user_type: member.user_type,
            is_site_admin: member.site_admin,
            role,
        }
    }

    /// Teams of the organization with a bounded sample of repos and members.
    /// `scanned` is reused when a team lists the scanned repository.
    pub async fn fetch_teams(&self, org: &str, scanned: &GithubRepository) -> Result<Vec<TeamSnapshot>> {
        let teams: Vec<TeamPayload> = self
            .get_json(&format!("orgs/{}/teams?per_page=100", org))
            .await
            .with_context(|| format!("Failed to list teams of '{}'", org))?;

        let mut snapshots = Vec::new();
        for team in teams {
            info!(team = %team.name, "Processing team");

            let repositories = match self
                .get_json::<Vec<RepoPayload>>(&format!(
                    "orgs/{}/teams/{}/repos?per_page={}",
                    org, team.slug, self.team_repo_limit
                ))
                .await
            {
                Ok(repos) => {
                    let mut records = Vec::new();
                    for repo in repos.into_iter().take(self.team_repo_limit) {
                        if repo.name == scanned.name {
                            records.push(scanned.clone());
                            continue;
                        }
                        records.push(GithubRepository {
                            visibility: repo.visibility(),
                            dependabot_enabled: self.dependabot_enabled(org, &repo.name).await,
                            name: repo.name,
                            ..Default::default()
                        });
                    }
                    records
                }
                Err(err) => {
                    warn!(team = %team.name, error = %format!("{:#}", err), "Could not list team repositories");
                    Vec::new()
                }
            };

            let mut members = Vec::new();
            match self
                .get_json::<Vec<MemberPayload>>(&format!(
                    "orgs/{}/teams/{}/members?per_page={}",
                    org, team.slug, self.team_member_limit
                ))
                .await
            {
                Ok(list) => {
                    for member in list.into_iter().take(self.team_member_limit) {
                        members.push(self.fetch_member(org, &team.slug, member).await);
                    }
                }
                Err(err) => {
                    warn!(team = %team.name, error = %format!("{:#}", err), "Could not list team members");
                }
            }

            snapshots.push(TeamSnapshot {
                team: GithubTeam {
                    name: team.name,
                    description: team.description.unwrap_or_default(),
                    permission: team.permission.unwrap_or_default(),
                },
                repositories,
                members,
            });
        }
        Ok(snapshots)
    }

    /// Requires the administration scope; `None` when not readable.
    pub async fn fetch_workflow_permissions(&self, owner: &str, repo: &str) -> Option<WorkflowPermissions> {
        match self
            .get_json(&format!("repos/{}/{}/actions/permissions/workflow", owner, repo))
            .await
        {
            Ok(permissions) => Some(permissions),
            Err(err) => {
                warn!(repo, error = %format!("{:#}", err), "Workflow permissions not readable");
                None
            }
        }
    }

    pub async fn fetch_action_permissions(&self, owner: &str, repo: &str) -> Option<ActionPermissions> {
        let payload: ActionPermissionsPayload = match self
            .get_json(&format!("repos/{}/{}/actions/permissions", owner, repo))
            .await
        {
            Ok(payload) => payload,
            Err(err) => {
                warn!(repo, error = %format!("{:#}", err), "Actions permissions not readable");
                return None;
            }
        };

        let mut permissions = payload.permissions;
        if payload.selected_actions_url.is_some() {
            match self
                .get_json::<SelectedActions>(&format!(
                    "repos/{}/{}/actions/permissions/selected-actions",
                    owner, repo
                ))
                .await
            {
                Ok(selected) => permissions.selected_actions = Some(selected),
                Err(err) => warn!(repo, error = %format!("{:#}", err), "Selected actions not readable"),
            }
        }
        Some(permissions)
    }

    /// Fetch everything a `github` scan ingests.
    pub async fn snapshot(&self, org: &str, repo: &str) -> Result<GitHubSnapshot> {
        info!(organization = org, repository = repo, "Fetching GitHub data");
        let organization = self.fetch_organization(org).await?;
        let repository = self.fetch_repository(org, repo).await?;

        let mut snapshot = GitHubSnapshot::new(organization, repository);
        snapshot.workflows = match self.fetch_workflows(org, repo).await {
            Ok(workflows) => workflows,
            Err(err) => {
                warn!(error = %format!("{:#}", err), "Could not list workflows");
                Vec::new()
            }
        };
        snapshot.teams = match self.fetch_teams(org, &snapshot.repository).await {
            Ok(teams) => teams,
            Err(err) => {
                warn!(error = %format!("{:#}", err), "Could not list teams");
                Vec::new()
            }
        };
        snapshot.workflow_permissions = self.fetch_workflow_permissions(org, repo).await;
        snapshot.action_permissions = self.fetch_action_permissions(org, repo).await;
        Ok(snapshot)
    }
}

/// Only a success status counts as enabled.
fn feature_state(path: &str, status: StatusCode) -> bool {
    if status.is_success() {
        return true;
    }
    if status != StatusCode::NOT_FOUND {
        warn!(path, status = %status, "Feature state unreadable, assuming disabled");
    }
    false
}
