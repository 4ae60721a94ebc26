use crate::domain::value_objects::{AuthorProfile, UserId};
use serde::{Deserialize, Serialize};

/// Authenticated user identity, injected at service construction
/// instead of being read from ambient global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub profile: AuthorProfile,
}

impl Session {
    pub fn new(profile: AuthorProfile) -> Self {
        Self { profile }
    }

    pub fn user_id(&self) -> &UserId {
        &self.profile.id
    }
}
