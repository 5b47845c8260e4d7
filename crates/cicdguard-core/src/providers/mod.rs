//! Async platform clients that build scan snapshots.
//!
//! Requests are awaited one at a time. A failed call for an individual item
//! is logged and the item is skipped; a failed call for the top-level object
//! (organization, repository, server) fails the whole fetch.

pub mod github_api;
pub mod jenkins_api;
pub mod jfrog_api;

pub use github_api::GitHubClient;
pub use jenkins_api::JenkinsClient;
pub use jfrog_api::JfrogClient;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

const CLIENT_AGENT: &str = concat!("cicdguard/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(mut headers: HeaderMap) -> Result<reqwest::Client> {
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_AGENT));
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Join a base URL and a path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://ci/", "/api/json"), "https://ci/api/json");
        assert_eq!(join_url("https://ci", "api/json"), "https://ci/api/json");
    }
}
