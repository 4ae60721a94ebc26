use super::ids::UserId;
use serde::{Deserialize, Serialize};

/// Denormalized author data rendered next to each interaction record,
/// mirroring the profile row joined by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl AuthorProfile {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}
