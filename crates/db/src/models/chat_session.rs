//! Chat session model and DTOs.

use hrchat_core::context::ChatContext;
use hrchat_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::chat_message::ChatMessage;

/// A row from the `chat_sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ChatSession {
    pub id: DbId,
    pub owner_id: DbId,
    /// Derived once from the first user message; never updated.
    pub title: String,
    /// Context the session was created under; never updated.
    pub context: String,
    pub created_at: Timestamp,
    /// Time of the last committed exchange.
    pub updated_at: Timestamp,
}

impl ChatSession {
    pub fn context(&self) -> ChatContext {
        ChatContext::from_param(Some(&self.context))
    }
}

/// Listing projection returned by `ListSessions`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SessionSummary {
    pub id: DbId,
    pub title: String,
    pub context: String,
    pub created_at: Timestamp,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        SessionSummary {
            id: session.id,
            title: session.title.clone(),
            context: session.context.clone(),
            created_at: session.created_at,
        }
    }
}

/// DTO for committing one completed exchange (user message + reply).
///
/// When `session_id` is `None` a session is created in the same transaction
/// from `title` and `context`; otherwise those two fields are ignored and the
/// existing session must belong to `owner_id`.
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub owner_id: DbId,
    pub session_id: Option<DbId>,
    pub title: String,
    pub context: ChatContext,
    pub user_content: String,
    pub assistant_content: String,
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommittedExchange {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}
