use super::{build_client, join_url};
use crate::config::GuardConfig;
use crate::rules::jenkins::is_https;
use crate::schema::{JenkinsBuild, JenkinsJob, JenkinsNode, JenkinsPlugin, JenkinsServer, JenkinsUser};
use crate::snapshot::{JenkinsProbe, JenkinsSnapshot, JobSnapshot};
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// Name Jenkins reports for builds run on the controller itself.
const BUILT_IN_NODE: &str = "built-in";

/// Jenkins remote-access API client (basic auth with an API token).
pub struct JenkinsClient {
    client: reqwest::Client,
    server: String,
    username: String,
    token: String,
    update_center_url: String,
    plugin_limit: usize,
}

#[derive(Debug, Deserialize)]
struct JobRef {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RootPayload {
    #[serde(default)]
    jobs: Vec<JobRef>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    number: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobPayload {
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    url: String,
    #[serde(default)]
    buildable: bool,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    last_build: Option<BuildRef>,
    #[serde(default)]
    last_successful_build: Option<BuildRef>,
}

impl JobPayload {
    fn into_record(self) -> JenkinsJob {
        JenkinsJob {
            is_running: self.color.as_deref().is_some_and(|c| c.ends_with("_anime")),
            is_enabled: self.buildable,
            full_name: self.full_name.unwrap_or_else(|| self.name.clone()),
            description: self.description.unwrap_or_default(),
            url: self.url,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildPayload {
    number: u64,
    url: String,
    #[serde(default)]
    full_display_name: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    built_on: Option<String>,
}

impl BuildPayload {
    fn node_name(&self) -> String {
        match self.built_on.as_deref() {
            Some(node) if !node.is_empty() => node.to_string(),
            _ => BUILT_IN_NODE.to_string(),
        }
    }

    fn into_record(self, job_name: &str, output: String) -> JenkinsBuild {
        let status = match (&self.result, self.building) {
            (_, true) => "RUNNING".to_string(),
            (Some(result), false) => result.clone(),
            (None, false) => "UNKNOWN".to_string(),
        };
        JenkinsBuild {
            name: self
                .full_display_name
                .clone()
                .unwrap_or_else(|| format!("{} #{}", job_name, self.number)),
            number: self.number.to_string(),
            status,
            node: self.node_name(),
            url: self.url,
            output,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputerPayload {
    display_name: String,
    #[serde(default)]
    offline: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComputerSet {
    #[serde(default)]
    computer: Vec<ComputerPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonPayload {
    full_name: String,
    absolute_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PeopleEntry {
    user: PersonPayload,
    #[serde(default)]
    project: Option<ProjectPayload>,
}

#[derive(Debug, Deserialize)]
struct PeoplePayload {
    #[serde(default)]
    users: Vec<PeopleEntry>,
}

impl PeopleEntry {
    fn into_record(self) -> JenkinsUser {
        let (project_name, project_url) = match self.project {
            Some(project) => (project.name, project.url),
            None => ("None".to_string(), "None".to_string()),
        };
        JenkinsUser {
            username: self.user.full_name,
            user_url: self.user.absolute_url,
            project_name,
            project_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginPayload {
    short_name: String,
    version: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    has_update: bool,
}

#[derive(Debug, Deserialize)]
struct PluginList {
    #[serde(default)]
    plugins: Vec<PluginPayload>,
}

#[derive(Debug, Deserialize)]
struct UpdateCenterPlugin {
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateCenter {
    #[serde(default)]
    plugins: HashMap<String, UpdateCenterPlugin>,
}

fn plugin_record(plugin: PluginPayload, center: &UpdateCenter) -> JenkinsPlugin {
    let available_version = center
        .plugins
        .get(&plugin.short_name)
        .map(|p| p.version.clone())
        .unwrap_or_default();
    JenkinsPlugin {
        installed_version: plugin.version,
        available_version,
        url: plugin
            .url
            .unwrap_or_else(|| format!("https://plugins.jenkins.io/{}", plugin.short_name)),
        enabled: plugin.enabled,
        has_update: plugin.has_update,
        name: plugin.short_name,
    }
}

impl JenkinsClient {
    pub fn new(config: &GuardConfig) -> Result<Self> {
        let access = config.jenkins()?;
        Ok(Self {
            client: build_client(HeaderMap::new())?,
            server: access.server.trim_end_matches('/').to_string(),
            username: access.username.to_string(),
            token: access.token.to_string(),
            update_center_url: config.jenkins.update_center_url.clone(),
            plugin_limit: config.scan.plugin_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.server, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .context("Jenkins API returned error")?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .context("Jenkins API returned error")?
            .text()
            .await
            .with_context(|| format!("Failed to read {}", url))
    }

    /// Server record and the jobs listed on the root API page.
    async fn fetch_server(&self) -> Result<(JenkinsServer, Vec<JobRef>)> {
        let response = self
            .client
            .get(self.url("api/json"))
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await
            .with_context(|| format!("Failed to reach Jenkins at {}", self.server))?
            .error_for_status()
            .context("Jenkins API returned error")?;

        let version = response
            .headers()
            .get("X-Jenkins")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let root: RootPayload = response
            .json()
            .await
            .context("Failed to parse Jenkins root API response")?;

        Ok((
            JenkinsServer {
                https_enabled: is_https(&self.server),
                url: self.server.clone(),
                version,
            },
            root.jobs,
        ))
    }

    /// Unauthenticated and crumb checks. Network errors count as "closed".
    async fn probe(&self) -> JenkinsProbe {
        let anonymous_read = self
            .client
            .get(self.url("api/json"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        let crumb_issuer = self
            .client
            .get(self.url("crumbIssuer/api/json"))
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        JenkinsProbe {
            anonymous_read,
            crumb_issuer,
        }
    }

    async fn fetch_build(&self, job_name: &str, build: &BuildRef) -> Result<JenkinsBuild> {
        let payload: BuildPayload = self.get_json(&join_url(&build.url, "api/json")).await?;
        let output = match self.get_text(&join_url(&build.url, "consoleText")).await {
            Ok(output) => output,
            Err(err) => {
                warn!(job = job_name, build = build.number, error = %format!("{:#}", err), "Could not read console output");
                String::new()
            }
        };
        Ok(payload.into_record(job_name, output))
    }

    /// The job with its last build and last successful build.
    async fn fetch_job(&self, job: &JobRef, agents: &HashMap<String, JenkinsNode>) -> Result<JobSnapshot> {
        let payload: JobPayload = self.get_json(&join_url(&job.url, "api/json")).await?;

        let mut refs: Vec<&BuildRef> = Vec::new();
        for build in [&payload.last_build, &payload.last_successful_build].into_iter().flatten() {
            if !refs.iter().any(|b| b.number == build.number) {
                refs.push(build);
            }
        }

        let mut builds = Vec::new();
        for build in refs {
            match self.fetch_build(&job.name, build).await {
                Ok(record) => builds.push(record),
                Err(err) => warn!(job = %job.name, build = build.number, error = %format!("{:#}", err), "Skipping build"),
            }
        }

        let mut job_agents: Vec<JenkinsNode> = Vec::new();
        for build in &builds {
            if job_agents.iter().any(|a| a.name == build.node) {
                continue;
            }
            match agents.get(&build.node) {
                Some(agent) => job_agents.push(agent.clone()),
                None => warn!(job = %job.name, node = %build.node, "Build ran on an unknown agent"),
            }
        }

        Ok(JobSnapshot {
            job: payload.into_record(),
            builds,
            agents: job_agents,
        })
    }

    async fn fetch_agents(&self) -> Result<HashMap<String, JenkinsNode>> {
        let set: ComputerSet = self.get_json(&self.url("computer/api/json")).await?;
        Ok(set
            .computer
            .into_iter()
            .map(|computer| {
                let (name, path) = match computer.display_name.as_str() {
                    "Built-In Node" | "master" | "built-in" => {
                        (BUILT_IN_NODE.to_string(), "computer/(built-in)/".to_string())
                    }
                    other => (other.to_string(), format!("computer/{}/", other)),
                };
                let node = JenkinsNode {
                    is_online: !computer.offline,
                    description: computer.description.unwrap_or_default(),
                    url: self.url(&path),
                    name: name.clone(),
                };
                (name, node)
            })
            .collect())
    }

    async fn fetch_users(&self) -> Result<Vec<JenkinsUser>> {
        let people: PeoplePayload = self.get_json(&self.url("asynchPeople/api/json?depth=1")).await?;
        Ok(people.users.into_iter().map(PeopleEntry::into_record).collect())
    }

    async fn fetch_plugins(&self) -> Result<Vec<JenkinsPlugin>> {
        let list: PluginList = self.get_json(&self.url("pluginManager/api/json?depth=1")).await?;
        let center: UpdateCenter = match self.client.get(&self.update_center_url).send().await {
            Ok(response) => response.json().await.unwrap_or_else(|err| {
                warn!(error = %err, "Could not parse update center data");
                UpdateCenter::default()
            }),
            Err(err) => {
                warn!(error = %err, "Could not reach update center");
                UpdateCenter::default()
            }
        };
        Ok(list
            .plugins
            .into_iter()
            .take(self.plugin_limit)
            .map(|plugin| plugin_record(plugin, &center))
            .collect())
    }

    /// Fetch everything a `jenkins` scan ingests.
    pub async fn snapshot(&self) -> Result<JenkinsSnapshot> {
        info!(server = %self.server, "Fetching Jenkins data");
        let (server, job_refs) = self.fetch_server().await?;
        let probe = self.probe().await;

        let agents = self.fetch_agents().await.unwrap_or_else(|err| {
            warn!(error = %format!("{:#}", err), "Could not list agents");
            HashMap::new()
        });

        let mut jobs = Vec::new();
        for job in &job_refs {
            info!(job = %job.name, "Processing job");
            match self.fetch_job(job, &agents).await {
                Ok(snapshot) => jobs.push(snapshot),
                Err(err) => warn!(job = %job.name, error = %format!("{:#}", err), "Skipping job"),
            }
        }

        let users = self.fetch_users().await.unwrap_or_else(|err| {
            warn!(error = %format!("{:#}", err), "Could not list users");
            Vec::new()
        });
        let plugins = self.fetch_plugins().await.unwrap_or_else(|err| {
            warn!(error = %format!("{:#}", err), "Could not list plugins");
            Vec::new()
        });

        Ok(JenkinsSnapshot {
            server,
            probe: Some(probe),
            jobs,
            users,
            plugins,
        })
    }
}
