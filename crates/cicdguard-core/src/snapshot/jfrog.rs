use crate::schema::{JfrogGroup, JfrogServer, JfrogUser};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group: JfrogGroup,
    #[serde(default)]
    pub members: Vec<JfrogUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JfrogSnapshot {
    pub server: JfrogServer,
    /// The repository listing answered without credentials.
    #[serde(default)]
    pub anonymous_read: bool,
    #[serde(default)]
    pub groups: Vec<GroupSnapshot>,
}
