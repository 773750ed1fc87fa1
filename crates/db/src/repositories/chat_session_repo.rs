//! Repository for the `chat_sessions` table.
//!
//! Every read and delete is scoped by `owner_id`; a session owned by someone
//! else behaves exactly like a missing one.

use hrchat_core::message::MessageRole;
use hrchat_core::types::DbId;
use sqlx::PgPool;

use crate::models::chat_session::{ChatSession, CommittedExchange, NewExchange, SessionSummary};
use crate::repositories::ChatMessageRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, title, context, created_at, updated_at";

/// Provides list / find / delete and the atomic exchange commit.
pub struct ChatSessionRepo;

impl ChatSessionRepo {
    /// Summaries of the owner's sessions, most recently active first.
    ///
    /// Sessions are only ever inserted together with their first exchange, so
    /// every listed session has at least one completed exchange.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<SessionSummary>, sqlx::Error> {
        sqlx::query_as::<_, SessionSummary>(
            "SELECT id, title, context, created_at FROM chat_sessions
             WHERE owner_id = $1
             ORDER BY updated_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Find a session by id, only if it belongs to `owner_id`.
    pub async fn find_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chat_sessions WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a session and (via `ON DELETE CASCADE`) all of its messages.
    ///
    /// Returns `false` when nothing matched, including on a repeated delete.
    pub async fn delete_for_owner(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Commit a completed exchange in one transaction.
    ///
    /// Creates the session when `input.session_id` is `None`. For an existing
    /// session the row is locked `FOR UPDATE` so concurrent commits cannot
    /// pick the same sequence numbers. Returns `Ok(None)` without writing
    /// anything when the existing session is gone or not owned by the caller.
    pub async fn commit_exchange(
        pool: &PgPool,
        input: &NewExchange,
    ) -> Result<Option<CommittedExchange>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let session = match input.session_id {
            None => {
                let query = format!(
                    "INSERT INTO chat_sessions (owner_id, title, context)
                     VALUES ($1, $2, $3)
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, ChatSession>(&query)
                    .bind(input.owner_id)
                    .bind(&input.title)
                    .bind(input.context.as_str())
                    .fetch_one(&mut *tx)
                    .await?
            }
            Some(id) => {
                let query = format!(
                    "UPDATE chat_sessions SET updated_at = NOW()
                     WHERE id = $1 AND owner_id = $2
                     RETURNING {COLUMNS}"
                );
                // The UPDATE takes the row lock for the rest of the transaction.
                let found = sqlx::query_as::<_, ChatSession>(&query)
                    .bind(id)
                    .bind(input.owner_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                match found {
                    Some(session) => session,
                    None => {
                        tx.rollback().await?;
                        return Ok(None);
                    }
                }
            }
        };

        let sequence = ChatMessageRepo::next_sequence_inner(&mut tx, session.id).await?;
        let user_message = ChatMessageRepo::insert_inner(
            &mut tx,
            session.id,
            MessageRole::User,
            &input.user_content,
            sequence,
        )
        .await?;
        let assistant_message = ChatMessageRepo::insert_inner(
            &mut tx,
            session.id,
            MessageRole::Assistant,
            &input.assistant_content,
            sequence + 1,
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(
            session_id = session.id,
            user_message_id = user_message.id,
            assistant_message_id = assistant_message.id,
            sequence,
            "Exchange committed",
        );

        Ok(Some(CommittedExchange {
            session,
            user_message,
            assistant_message,
        }))
    }
}
