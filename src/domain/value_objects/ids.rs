use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that namespaces Tentative Identities away from server ids.
const LOCAL_PREFIX: &str = "local:";

macro_rules! string_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: String) -> Result<Self, String> {
                if value.trim().is_empty() {
                    return Err(concat!($label, " cannot be empty").to_string());
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(PostId, "Post id");
string_id!(GroupId, "Group id");
string_id!(UserId, "User id");

/// Identity of an interaction record.
///
/// `Local` is a Tentative Identity minted before the server has
/// confirmed the record; it renders as `local:<uuid>` so it can never
/// collide with a server-assigned id. Once confirmed, the record is
/// re-keyed to `Server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RecordId {
    Local(String),
    Server(String),
}

impl RecordId {
    /// Mints a fresh Tentative Identity.
    pub fn tentative() -> Self {
        RecordId::Local(uuid::Uuid::new_v4().to_string())
    }

    pub fn server(value: impl Into<String>) -> Self {
        RecordId::Server(value.into())
    }

    pub fn is_tentative(&self) -> bool {
        matches!(self, RecordId::Local(_))
    }

    /// Server-side id, if this record has been confirmed.
    pub fn server_str(&self) -> Option<&str> {
        match self {
            RecordId::Server(value) => Some(value),
            RecordId::Local(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Local(value) => write!(f, "{LOCAL_PREFIX}{value}"),
            RecordId::Server(value) => write!(f, "{value}"),
        }
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        match value.strip_prefix(LOCAL_PREFIX) {
            Some(rest) => RecordId::Local(rest.to_string()),
            None => RecordId::Server(value),
        }
    }
}
