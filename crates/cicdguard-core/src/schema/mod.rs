//! The fixed node/relationship catalog of the inventory graph.
//!
//! Every node kind has a natural key and a closed attribute set. At the
//! storage boundary all attributes are strings; the typed records in
//! [`records`] convert to and from that form.

pub mod records;

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use records::*;

/// Attribute map as stored: one string value per schema field.
pub type Attributes = BTreeMap<String, String>;

/// The CI/CD platform a node kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Jenkins,
    GitHub,
    Jfrog,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Jenkins, Platform::GitHub, Platform::Jfrog];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Jenkins => "jenkins",
            Platform::GitHub => "github",
            Platform::Jfrog => "jfrog",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jenkins" => Some(Platform::Jenkins),
            "github" | "actions" => Some(Platform::GitHub),
            "jfrog" | "artifactory" => Some(Platform::Jfrog),
            _ => None,
        }
    }

    pub fn kinds(&self) -> Vec<NodeKind> {
        NodeKind::ALL
            .iter()
            .copied()
            .filter(|kind| kind.platform() == *self)
            .collect()
    }
}

/// Every node kind the inventory knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    JenkinsServer,
    JenkinsPlugin,
    JenkinsUser,
    JenkinsJob,
    JenkinsBuild,
    JenkinsNode,
    GithubOrganization,
    GithubRepository,
    GithubTeam,
    GithubUser,
    ActionWorkflow,
    ActionJob,
    ActionStep,
    ActionRunner,
    ActionAction,
    ActionCommand,
    JfrogServer,
    JfrogGroup,
    JfrogUser,
}

impl NodeKind {
    pub const ALL: [NodeKind; 19] = [
        NodeKind::JenkinsServer,
        NodeKind::JenkinsPlugin,
        NodeKind::JenkinsUser,
        NodeKind::JenkinsJob,
        NodeKind::JenkinsBuild,
        NodeKind::JenkinsNode,
        NodeKind::GithubOrganization,
        NodeKind::GithubRepository,
        NodeKind::GithubTeam,
        NodeKind::GithubUser,
        NodeKind::ActionWorkflow,
        NodeKind::ActionJob,
        NodeKind::ActionStep,
        NodeKind::ActionRunner,
        NodeKind::ActionAction,
        NodeKind::ActionCommand,
        NodeKind::JfrogServer,
        NodeKind::JfrogGroup,
        NodeKind::JfrogUser,
    ];

    /// Graph label, compatible with records written by earlier scanners.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::JenkinsServer => "Jenkins_Server",
            NodeKind::JenkinsPlugin => "Jenkins_Plugin",
            NodeKind::JenkinsUser => "Jenkins_User",
            NodeKind::JenkinsJob => "Jenkins_Job",
            NodeKind::JenkinsBuild => "Jenkins_Build",
            NodeKind::JenkinsNode => "Jenkins_Node",
            NodeKind::GithubOrganization => "Github_Organization",
            NodeKind::GithubRepository => "Github_Repository",
            NodeKind::GithubTeam => "Github_Team",
            NodeKind::GithubUser => "Github_User",
            NodeKind::ActionWorkflow => "Action_Workflow",
            NodeKind::ActionJob => "Action_Job",
            NodeKind::ActionStep => "Action_Step",
            NodeKind::ActionRunner => "Action_Runner",
            NodeKind::ActionAction => "Action_Action",
            NodeKind::ActionCommand => "Action_Command",
            NodeKind::JfrogServer => "JFrog_Server",
            NodeKind::JfrogGroup => "JFrog_Group",
            NodeKind::JfrogUser => "JFrog_User",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        NodeKind::ALL.iter().copied().find(|kind| kind.label() == label)
    }

    /// Human-readable technology name shown next to findings.
    pub fn technology(&self) -> &'static str {
        match self {
            NodeKind::JenkinsServer => "Jenkins Server",
            NodeKind::JenkinsPlugin => "Jenkins Plugin",
            NodeKind::JenkinsUser => "Jenkins User",
            NodeKind::JenkinsJob => "Jenkins Job",
            NodeKind::JenkinsBuild => "Jenkins Build",
            NodeKind::JenkinsNode => "Jenkins Node",
            NodeKind::GithubOrganization => "Github Organization",
            NodeKind::GithubRepository => "Github Repository",
            NodeKind::GithubTeam => "Github Team",
            NodeKind::GithubUser => "Github User",
            NodeKind::ActionWorkflow => "Github Action Workflow",
            NodeKind::ActionJob => "Github Action Job",
            NodeKind::ActionStep => "Github Action Step",
            NodeKind::ActionRunner => "Github Action Runner",
            NodeKind::ActionAction => "Github Action",
            NodeKind::ActionCommand => "Github Action Command",
            NodeKind::JfrogServer => "JFrog Server",
            NodeKind::JfrogGroup => "JFrog Group",
            NodeKind::JfrogUser => "JFrog User",
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            NodeKind::JenkinsServer
            | NodeKind::JenkinsPlugin
            | NodeKind::JenkinsUser
            | NodeKind::JenkinsJob
            | NodeKind::JenkinsBuild
            | NodeKind::JenkinsNode => Platform::Jenkins,
            NodeKind::JfrogServer | NodeKind::JfrogGroup | NodeKind::JfrogUser => Platform::Jfrog,
            _ => Platform::GitHub,
        }
    }

    /// Name of the attribute that identifies a node of this kind.
    pub fn key_field(&self) -> &'static str {
        match self {
            NodeKind::JenkinsServer | NodeKind::JfrogServer => "url",
            NodeKind::JenkinsUser => "username",
            NodeKind::ActionRunner => "labels",
            NodeKind::ActionCommand => "command",
            _ => "name",
        }
    }

    /// Every schema field of this kind, natural key first.
    pub fn fields(&self) -> &'static [&'static str] {
        records::fields_of(*self)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    Contains,
    Has,
    Executes,
    Runs,
    Build,
    Reference,
    PartOf,
    Member,
    Contributes,
    Have,
    RunsOn,
    Uses,
}

impl Relation {
    pub const ALL: [Relation; 12] = [
        Relation::Contains,
        Relation::Has,
        Relation::Executes,
        Relation::Runs,
        Relation::Build,
        Relation::Reference,
        Relation::PartOf,
        Relation::Member,
        Relation::Contributes,
        Relation::Have,
        Relation::RunsOn,
        Relation::Uses,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Relation::Contains => "CONTAINS",
            Relation::Has => "HAS",
            Relation::Executes => "EXECUTES",
            Relation::Runs => "RUNS",
            Relation::Build => "BUILD",
            Relation::Reference => "REFERENCE",
            Relation::PartOf => "PART_OF",
            Relation::Member => "MEMBER",
            Relation::Contributes => "CONTRIBUTES",
            Relation::Have => "HAVE",
            Relation::RunsOn => "RUNS_ON",
            Relation::Uses => "USES",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Relation::ALL.iter().copied().find(|rel| rel.label() == label)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Directed relationships the graph accepts, as (source, relation, target).
pub const ALLOWED_RELATIONS: &[(NodeKind, Relation, NodeKind)] = &[
    (NodeKind::JenkinsServer, Relation::Contains, NodeKind::JenkinsPlugin),
    (NodeKind::JenkinsServer, Relation::Has, NodeKind::JenkinsUser),
    (NodeKind::JenkinsServer, Relation::Executes, NodeKind::JenkinsJob),
    (NodeKind::JenkinsJob, Relation::Build, NodeKind::JenkinsBuild),
    (NodeKind::JenkinsBuild, Relation::Reference, NodeKind::GithubRepository),
    (NodeKind::JenkinsNode, Relation::Runs, NodeKind::JenkinsJob),
    (NodeKind::GithubOrganization, Relation::PartOf, NodeKind::GithubRepository),
    (NodeKind::GithubOrganization, Relation::Has, NodeKind::GithubTeam),
    (NodeKind::GithubTeam, Relation::Member, NodeKind::GithubUser),
    (NodeKind::GithubTeam, Relation::Contributes, NodeKind::GithubRepository),
    (NodeKind::ActionWorkflow, Relation::Contains, NodeKind::GithubRepository),
    (NodeKind::ActionJob, Relation::Have, NodeKind::ActionWorkflow),
    (NodeKind::ActionStep, Relation::Executes, NodeKind::ActionJob),
    (NodeKind::ActionRunner, Relation::RunsOn, NodeKind::ActionJob),
    (NodeKind::ActionAction, Relation::Uses, NodeKind::ActionStep),
    (NodeKind::ActionCommand, Relation::Runs, NodeKind::ActionStep),
    (NodeKind::JfrogServer, Relation::Has, NodeKind::JfrogGroup),
    (NodeKind::JfrogGroup, Relation::PartOf, NodeKind::JfrogUser),
];

pub fn allows(source: NodeKind, relation: Relation, target: NodeKind) -> bool {
    ALLOWED_RELATIONS
        .iter()
        .any(|&(s, r, t)| s == source && r == relation && t == target)
}

/// A scalar attribute value with a fixed textual form.
pub trait AttrValue: Sized {
    fn to_attr(&self) -> String;
    fn from_attr(raw: &str) -> Option<Self>;
}

impl AttrValue for String {
    fn to_attr(&self) -> String {
        self.clone()
    }

    fn from_attr(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl AttrValue for bool {
    fn to_attr(&self) -> String {
        if *self { "True" } else { "False" }.to_string()
    }

    fn from_attr(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}

/// A typed node of one kind, convertible to and from its stored attributes.
pub trait NodeRecord: Sized {
    const KIND: NodeKind;
    const FIELDS: &'static [&'static str];

    fn natural_key(&self) -> &str;
    fn to_attributes(&self) -> Attributes;
    fn from_attributes(attrs: &Attributes) -> GuardResult<Self>;
}

pub(crate) fn required<T: AttrValue>(kind: NodeKind, attrs: &Attributes, field: &str) -> GuardResult<T> {
    let raw = attrs
        .get(field)
        .ok_or_else(|| GuardError::malformed(kind, field, "is missing"))?;
    T::from_attr(raw)
        .ok_or_else(|| GuardError::malformed(kind, field, format!("has unparsable value '{}'", raw)))
}

/// Validate raw attributes against the schema of `kind` and return them in
/// canonical text form.
pub fn normalize(kind: NodeKind, attrs: &Attributes) -> GuardResult<Attributes> {
    let fields = kind.fields();
    if let Some(unknown) = attrs.keys().find(|k| !fields.contains(&k.as_str())) {
        return Err(GuardError::malformed(kind, unknown, "is not part of the schema"));
    }
    let normalized = records::round_trip(kind, attrs)?;
    let key = normalized.get(kind.key_field()).map(|k| k.trim()).unwrap_or("");
    if key.is_empty() {
        return Err(GuardError::malformed(kind, kind.key_field(), "is empty"));
    }
    Ok(normalized)
}
