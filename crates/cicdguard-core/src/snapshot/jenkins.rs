use crate::schema::{JenkinsBuild, JenkinsJob, JenkinsNode, JenkinsPlugin, JenkinsServer, JenkinsUser};
use serde::{Deserialize, Serialize};

/// Unauthenticated checks run against the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JenkinsProbe {
    /// `/api/json` answered without credentials.
    pub anonymous_read: bool,
    /// A CSRF crumb issuer answered.
    pub crumb_issuer: bool,
}

/// A job with its recent builds and the agents that ran them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job: JenkinsJob,
    #[serde(default)]
    pub builds: Vec<JenkinsBuild>,
    #[serde(default)]
    pub agents: Vec<JenkinsNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JenkinsSnapshot {
    pub server: JenkinsServer,
    /// `None` when the unauthenticated checks were not run, e.g. in a
    /// replayed snapshot that lacks them.
    #[serde(default)]
    pub probe: Option<JenkinsProbe>,
    #[serde(default)]
    pub jobs: Vec<JobSnapshot>,
    #[serde(default)]
    pub users: Vec<JenkinsUser>,
    #[serde(default)]
    pub plugins: Vec<JenkinsPlugin>,
}
