use serde::{Deserialize, Serialize};
use std::fmt;

/// List-shaped interaction types sharing the optimistic sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Comment,
    Message,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Comment => "comment",
            InteractionKind::Message => "message",
        }
    }

    /// Remote table the kind maps onto.
    pub fn table(&self) -> &'static str {
        match self {
            InteractionKind::Comment => "comments",
            InteractionKind::Message => "group_messages",
        }
    }

    pub fn add_action(&self) -> ActionKind {
        match self {
            InteractionKind::Comment => ActionKind::AddComment,
            InteractionKind::Message => ActionKind::SendMessage,
        }
    }

    pub fn delete_action(&self) -> ActionKind {
        match self {
            InteractionKind::Comment => ActionKind::DeleteComment,
            InteractionKind::Message => ActionKind::DeleteMessage,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch key component; one in-flight mutation is allowed per
/// (user, target, action) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ToggleLike,
    AddComment,
    DeleteComment,
    SendMessage,
    DeleteMessage,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ToggleLike => "toggle_like",
            ActionKind::AddComment => "add_comment",
            ActionKind::DeleteComment => "delete_comment",
            ActionKind::SendMessage => "send_message",
            ActionKind::DeleteMessage => "delete_message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an optimistically applied record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Confirmed => "confirmed",
            SyncStatus::Failed => "failed",
        };
        f.write_str(tag)
    }
}
