//! Session record and conversation turns

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Handle to a session record owned by a store.
///
/// Requests hold a clone of the handle; the record itself stays in the store.
pub type SharedSession = Arc<Mutex<Session>>;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Conversation session
///
/// `history` is insertion ordered, most recent last. The store never caps its
/// length; consumers truncate before building a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque random identifier, also the session cookie value
    pub id: String,
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
    /// Conversation so far
    pub history: Vec<ChatTurn>,
}

impl Session {
    /// Create a session with a fresh UUID v4 identifier
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create a session with a specific ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// The last `max_turns` entries of the history
    pub fn recent_history(&self, max_turns: usize) -> &[ChatTurn] {
        let start = self.history.len().saturating_sub(max_turns);
        &self.history[start..]
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
