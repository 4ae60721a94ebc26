use super::ids::{GroupId, PostId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity an interaction record applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum TargetRef {
    Post(PostId),
    Group(GroupId),
}

impl TargetRef {
    pub fn post(id: PostId) -> Self {
        TargetRef::Post(id)
    }

    pub fn group(id: GroupId) -> Self {
        TargetRef::Group(id)
    }

    pub fn id_str(&self) -> &str {
        match self {
            TargetRef::Post(id) => id.as_str(),
            TargetRef::Group(id) => id.as_str(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Post(id) => write!(f, "post:{id}"),
            TargetRef::Group(id) => write!(f, "group:{id}"),
        }
    }
}
