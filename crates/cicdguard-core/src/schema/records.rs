//! One typed record per node kind.

use super::{required, AttrValue, Attributes, NodeKind, NodeRecord};
use crate::error::GuardResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a node record: the natural key comes first, then the remaining
/// schema fields in stored order.
macro_rules! node_record {
    (
        $(#[$meta:meta])*
        $name:ident, key = $key:ident {
            $( $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name {
            pub $key: String,
            $( pub $field: $ty, )*
        }

        impl NodeRecord for $name {
            const KIND: NodeKind = NodeKind::$name;
            const FIELDS: &'static [&'static str] = &[stringify!($key), $( stringify!($field), )*];

            fn natural_key(&self) -> &str {
                &self.$key
            }

            fn to_attributes(&self) -> Attributes {
                let mut attrs = Attributes::new();
                attrs.insert(stringify!($key).to_string(), self.$key.clone());
                $( attrs.insert(stringify!($field).to_string(), AttrValue::to_attr(&self.$field)); )*
                attrs
            }

            fn from_attributes(attrs: &Attributes) -> GuardResult<Self> {
                Ok(Self {
                    $key: required::<String>(NodeKind::$name, attrs, stringify!($key))?,
                    $( $field: required::<$ty>(NodeKind::$name, attrs, stringify!($field))?, )*
                })
            }
        }
    };
}

// Jenkins

node_record! {
    /// A Jenkins controller, identified by its base URL.
    JenkinsServer, key = url {
        https_enabled: bool,
        version: String,
    }
}

node_record! {
    JenkinsPlugin, key = name {
        installed_version: String,
        available_version: String,
        url: String,
        enabled: bool,
        has_update: bool,
    }
}

node_record! {
    JenkinsUser, key = username {
        user_url: String,
        project_name: String,
        project_url: String,
    }
}

node_record! {
    JenkinsJob, key = name {
        description: String,
        is_running: bool,
        is_enabled: bool,
        full_name: String,
        url: String,
    }
}

node_record! {
    /// A single build of a job. `node` is the agent that ran it.
    JenkinsBuild, key = name {
        number: String,
        status: String,
        url: String,
        output: String,
        node: String,
    }
}

node_record! {
    /// A Jenkins agent (worker).
    JenkinsNode, key = name {
        is_online: bool,
        description: String,
        url: String,
    }
}

// GitHub

node_record! {
    GithubOrganization, key = name {
        two_factor_enabled: bool,
    }
}

node_record! {
    GithubRepository, key = name {
        visibility: Visibility,
        dependabot_enabled: bool,
        secret_scanning_enabled: bool,
        code_scanning_enabled: bool,
    }
}

node_record! {
    GithubTeam, key = name {
        description: String,
        permission: String,
    }
}

node_record! {
    GithubUser, key = name {
        email: String,
        user_type: String,
        is_site_admin: bool,
        role: String,
    }
}

node_record! {
    /// `trigger` holds the comma-separated workflow events.
    ActionWorkflow, key = name {
        trigger: String,
    }
}

node_record! {
    ActionJob, key = name {}
}

node_record! {
    ActionStep, key = name {}
}

node_record! {
    /// Runner label set of a job, comma-separated.
    ActionRunner, key = labels {}
}

node_record! {
    /// A `uses:` reference, kept verbatim including the `@ref` suffix.
    ActionAction, key = name {}
}

node_record! {
    ActionCommand, key = command {}
}

// JFrog

node_record! {
    JfrogServer, key = url {
        https_enabled: bool,
    }
}

node_record! {
    JfrogGroup, key = name {
        description: String,
        admin_privileges: bool,
        realm: String,
    }
}

node_record! {
    JfrogUser, key = name {
        email: String,
        is_admin: bool,
        realm: String,
        status: String,
    }
}

macro_rules! kind_dispatch {
    ($($name:ident),* $(,)?) => {
        pub(crate) fn fields_of(kind: NodeKind) -> &'static [&'static str] {
            match kind {
                $( NodeKind::$name => <$name as NodeRecord>::FIELDS, )*
            }
        }

        pub(crate) fn round_trip(kind: NodeKind, attrs: &Attributes) -> GuardResult<Attributes> {
            match kind {
                $( NodeKind::$name => $name::from_attributes(attrs).map(|r| r.to_attributes()), )*
            }
        }
    };
}

kind_dispatch!(
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
);

/// Repository visibility as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
    /// Known only by reference, e.g. a repository seen in build output.
    #[default]
    Unknown,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Unknown => "unknown",
        }
    }

    /// Internal repositories are private to the enterprise.
    pub fn is_private(&self) -> bool {
        matches!(self, Visibility::Private | Visibility::Internal)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AttrValue for Visibility {
    fn to_attr(&self) -> String {
        self.as_str().to_string()
    }

    fn from_attr(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "internal" => Some(Visibility::Internal),
            "" | "unknown" | "none" => Some(Visibility::Unknown),
            _ => None,
        }
    }
}
