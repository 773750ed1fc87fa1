//! Repository for the `chat_messages` table.
//!
//! There is no update or single-message delete: messages are append-only and
//! disappear only through the cascade of a session delete.

use hrchat_core::message::MessageRole;
use hrchat_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::chat_message::ChatMessage;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, session_id, role, content, sequence, created_at";

/// Read access and transactional appends for chat messages.
pub struct ChatMessageRepo;

impl ChatMessageRepo {
    /// All messages of a session in replay order.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chat_messages
             WHERE session_id = $1
             ORDER BY sequence ASC"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }

    /// Next free sequence number for a session.
    ///
    /// Only meaningful while the caller holds the session row lock taken by
    /// [`super::ChatSessionRepo::commit_exchange`].
    pub(crate) async fn next_sequence_inner(
        conn: &mut PgConnection,
        session_id: DbId,
    ) -> Result<i32, sqlx::Error> {
        let (max,): (Option<i32>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM chat_messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Append one message inside an open transaction.
    pub(crate) async fn insert_inner(
        conn: &mut PgConnection,
        session_id: DbId,
        role: MessageRole,
        content: &str,
        sequence: i32,
    ) -> Result<ChatMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_messages (session_id, role, content, sequence)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .bind(role.as_str())
            .bind(content)
            .bind(sequence)
            .fetch_one(&mut *conn)
            .await
    }
}
