use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ANONYMOUS_OWNER_EMAIL;

// Opaque identifier of a signed-in principal, assigned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        short_prefix(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Opaque document identifier, assigned by the backend on create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        short_prefix(&self.0)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn short_prefix(s: &str) -> &str {
    match s.char_indices().nth(8) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// The signed-in principal: a named account or an anonymous guest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: UserId,
    /// `None` for guest sessions.
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl Identity {
    pub fn named(uid: UserId, email: impl Into<String>) -> Self {
        Self {
            uid,
            email: Some(email.into()),
            is_anonymous: false,
        }
    }

    pub fn anonymous(uid: UserId) -> Self {
        Self {
            uid,
            email: None,
            is_anonymous: true,
        }
    }

    /// Email stamped on task documents this identity creates.
    pub fn owner_email(&self) -> &str {
        self.email.as_deref().unwrap_or(ANONYMOUS_OWNER_EMAIL)
    }
}

/// A task document as reported by the live feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    /// Missing on documents whose server timestamp has not been resolved.
    pub created_at: Option<DateTime<Utc>>,
    pub owner_id: UserId,
    pub owner_email: Option<String>,
}

/// Creation timestamp sent with a create request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreatedAt {
    /// Resolved by the backend against its own clock.
    ServerTimestamp,
    At(DateTime<Utc>),
}

/// Payload of a create request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub text: String,
    pub completed: bool,
    pub created_at: CreatedAt,
    pub owner_id: UserId,
    pub owner_email: String,
}

impl NewTask {
    /// A fresh, uncompleted task owned by `identity`.
    pub fn for_identity(identity: &Identity, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
            created_at: CreatedAt::ServerTimestamp,
            owner_id: identity.uid.clone(),
            owner_email: identity.owner_email().to_string(),
        }
    }
}

/// Partial update of a task document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskPatch {
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_none()
    }
}
