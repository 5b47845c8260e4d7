//! Raw platform data fetched for one scan run, before ingestion.
//!
//! Snapshots reuse the typed node records, so a provider fills in exactly the
//! fields the graph stores. They serialize to JSON for offline replays.

pub mod github;
pub mod jenkins;
pub mod jfrog;

pub use github::{
    ActionPermissions, AllowedActions, GitHubSnapshot, SelectedActions, TeamSnapshot,
    WorkflowPermissions, WorkflowSource,
};
pub use jenkins::{JenkinsProbe, JenkinsSnapshot, JobSnapshot};
pub use jfrog::{GroupSnapshot, JfrogSnapshot};
