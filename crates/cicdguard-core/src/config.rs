//! Scanner configuration: an optional TOML file overlaid with environment
//! variables. Built once at startup and passed by reference.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = ".cicdguard/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration '{key}' (set {env} or add it to the config file)")]
    Missing { key: &'static str, env: &'static str },

    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JenkinsConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    /// Source of the latest plugin versions.
    pub update_center_url: String,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            token: None,
            update_center_url: "https://updates.jenkins.io/current/update-center.actual.json"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JfrogConfig {
    pub url: Option<String>,
    pub access_token: Option<String>,
}

/// Per-run limits and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Pause between JFrog group and member requests.
    pub page_delay_secs: u64,
    pub plugin_limit: usize,
    pub group_limit: usize,
    pub group_member_limit: usize,
    pub team_repo_limit: usize,
    pub team_member_limit: usize,
    /// Skip findings already recorded on a node with the same evidence.
    pub dedupe_findings: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_delay_secs: 5,
            plugin_limit: 20,
            group_limit: 5,
            group_member_limit: 3,
            team_repo_limit: 5,
            team_member_limit: 5,
            dedupe_findings: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub github: GitHubConfig,
    pub jenkins: JenkinsConfig,
    pub jfrog: JfrogConfig,
    pub scan: ScanConfig,
}

/// Credentials for a Jenkins scan.
#[derive(Debug, Clone)]
pub struct JenkinsAccess<'a> {
    pub server: &'a str,
    pub username: &'a str,
    pub token: &'a str,
}

/// Credentials for a JFrog scan.
#[derive(Debug, Clone)]
pub struct JfrogAccess<'a> {
    pub url: &'a str,
    pub access_token: &'a str,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl GuardConfig {
    /// Read the config file (when given) and apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content, path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Overlay non-empty environment values on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_ACCESS_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_API_URL") {
            self.github.api_url = v;
        }
        if let Some(v) = get("JENKINS_SERVER") {
            self.jenkins.server = Some(v);
        }
        if let Some(v) = get("JENKINS_USERNAME") {
            self.jenkins.username = Some(v);
        }
        if let Some(v) = get("JENKINS_TOKEN") {
            self.jenkins.token = Some(v);
        }
        if let Some(v) = get("JFROG_URL") {
            self.jfrog.url = Some(v);
        }
        if let Some(v) = get("JFROG_ACCESS_TOKEN") {
            self.jfrog.access_token = Some(v);
        }
    }

    pub fn github_token(&self) -> Result<&str, ConfigError> {
        non_empty(&self.github.token).ok_or(ConfigError::Missing {
            key: "github.token",
            env: "GITHUB_ACCESS_TOKEN",
        })
    }

    pub fn jenkins(&self) -> Result<JenkinsAccess<'_>, ConfigError> {
        Ok(JenkinsAccess {
            server: non_empty(&self.jenkins.server).ok_or(ConfigError::Missing {
                key: "jenkins.server",
                env: "JENKINS_SERVER",
            })?,
            username: non_empty(&self.jenkins.username).ok_or(ConfigError::Missing {
                key: "jenkins.username",
                env: "JENKINS_USERNAME",
            })?,
            token: non_empty(&self.jenkins.token).ok_or(ConfigError::Missing {
                key: "jenkins.token",
                env: "JENKINS_TOKEN",
            })?,
        })
    }

    pub fn jfrog(&self) -> Result<JfrogAccess<'_>, ConfigError> {
        Ok(JfrogAccess {
            url: non_empty(&self.jfrog.url).ok_or(ConfigError::Missing {
                key: "jfrog.url",
                env: "JFROG_URL",
            })?,
            access_token: non_empty(&self.jfrog.access_token).ok_or(ConfigError::Missing {
                key: "jfrog.access_token",
                env: "JFROG_ACCESS_TOKEN",
            })?,
        })
    }
}
