use super::{build_client, join_url};
use crate::config::GuardConfig;
use crate::rules::jenkins::is_https;
use crate::rules::jfrog::ANONYMOUS_PROBE_PATH;
use crate::schema::{JfrogGroup, JfrogServer, JfrogUser};
use crate::snapshot::{GroupSnapshot, JfrogSnapshot};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const GROUPS_PATH: &str = "access/api/v2/groups";
const USERS_PATH: &str = "access/api/v2/users";

/// JFrog Access API client. Calls are paced by `scan.page_delay_secs`.
pub struct JfrogClient {
    client: reqwest::Client,
    /// Client without credentials, for the anonymous probe.
    anonymous: reqwest::Client,
    base_url: String,
    page_delay: Duration,
    group_limit: usize,
    group_member_limit: usize,
}

#[derive(Debug, Deserialize)]
struct GroupRef {
    group_name: String,
}

#[derive(Debug, Deserialize)]
struct GroupList {
    #[serde(default)]
    groups: Vec<GroupRef>,
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    admin_privileges: bool,
    #[serde(default)]
    realm: Option<String>,
    #[serde(default)]
    members: Vec<String>,
}

impl GroupPayload {
    fn to_record(&self) -> JfrogGroup {
        JfrogGroup {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            admin_privileges: self.admin_privileges,
            realm: self.realm.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    realm: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl From<UserPayload> for JfrogUser {
    fn from(user: UserPayload) -> Self {
        JfrogUser {
            name: user.username,
            email: user.email.unwrap_or_default(),
            is_admin: user.admin,
            realm: user.realm.unwrap_or_default(),
            status: user.status.unwrap_or_default(),
        }
    }
}

impl JfrogClient {
    pub fn new(config: &GuardConfig) -> Result<Self> {
        let access = config.jfrog()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", access.access_token))
                .context("Invalid JFrog access token")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: build_client(headers)?,
            anonymous: build_client(HeaderMap::new())?,
            base_url: access.url.trim_end_matches('/').to_string(),
            page_delay: Duration::from_secs(config.scan.page_delay_secs),
            group_limit: config.scan.group_limit,
            group_member_limit: config.scan.group_member_limit,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = join_url(&self.base_url, path);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .context("JFrog API returned error")?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn pause(&self) {
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
    }

    /// True when the repository listing is served to an unauthenticated caller.
    async fn anonymous_read(&self) -> bool {
        let url = join_url(&self.base_url, ANONYMOUS_PROBE_PATH);
        match self.anonymous.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<Vec<serde_json::Value>>()
                .await
                .map(|repos| !repos.is_empty())
                .unwrap_or(false),
            Ok(_) => false,
            Err(err) => {
                warn!(error = %err, "Anonymous probe failed");
                false
            }
        }
    }

    async fn fetch_group(&self, name: &str) -> Result<GroupSnapshot> {
        let payload: GroupPayload = self.get_json(&format!("{}/{}", GROUPS_PATH, name)).await?;

        let mut members = Vec::new();
        for username in payload.members.iter().take(self.group_member_limit) {
            self.pause().await;
            info!(group = name, user = %username, "Processing user");
            match self
                .get_json::<UserPayload>(&format!("{}/{}", USERS_PATH, username))
                .await
            {
                Ok(user) => members.push(user.into()),
                Err(err) => warn!(user = %username, error = %format!("{:#}", err), "Skipping user"),
            }
        }

        Ok(GroupSnapshot {
            group: payload.to_record(),
            members,
        })
    }

    /// Fetch everything a `jfrog` scan ingests.
    pub async fn snapshot(&self) -> Result<JfrogSnapshot> {
        info!(server = %self.base_url, "Fetching JFrog data");
        let server = JfrogServer {
            https_enabled: is_https(&self.base_url),
            url: self.base_url.clone(),
        };
        let anonymous_read = self.anonymous_read().await;

        let list: GroupList = self.get_json(GROUPS_PATH).await?;
        let mut groups = Vec::new();
        for group in list.groups.iter().take(self.group_limit) {
            self.pause().await;
            info!(group = %group.group_name, "Processing group");
            match self.fetch_group(&group.group_name).await {
                Ok(snapshot) => groups.push(snapshot),
                Err(err) => warn!(group = %group.group_name, error = %format!("{:#}", err), "Skipping group"),
            }
        }

        Ok(JfrogSnapshot {
            server,
            anonymous_read,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_payload_to_record() {
        let payload: GroupPayload = serde_json::from_str(
            r#"{"name":"readers","description":null,"admin_privileges":false,
                "realm":"internal","members":["alice","bob"]}"#,
        )
        .unwrap();
        let group = payload.to_record();
        assert_eq!(group.name, "readers");
        assert_eq!(group.description, "");
        assert_eq!(payload.members.len(), 2);
    }

    #[test]
    fn test_user_payload_conversion() {
        let payload: UserPayload = serde_json::from_str(
            r#"{"username":"alice","email":"alice@acme.io","admin":true,"realm":"saml","status":"enabled"}"#,
        )
        .unwrap();
        let user: JfrogUser = payload.into();
        assert!(user.is_admin);
        assert_eq!(user.status, "enabled");
    }
}
