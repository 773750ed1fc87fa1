//! Chat message model.

use hrchat_core::message::MessageRole;
use hrchat_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `chat_messages` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub session_id: DbId,
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
    /// Strictly increasing per session; the only ordering used for replay.
    pub sequence: i32,
    pub created_at: Timestamp,
}

impl ChatMessage {
    /// Parsed role. Rows are constrained by `ck_chat_messages_role`, so an
    /// unknown value can only come from a hand-edited database.
    pub fn role(&self) -> Option<MessageRole> {
        MessageRole::parse(&self.role)
    }
}
