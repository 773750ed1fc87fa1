use async_trait::async_trait;
use hrchat_core::types::DbId;

use super::SessionStore;
use crate::models::chat_message::ChatMessage;
use crate::models::chat_session::{ChatSession, CommittedExchange, NewExchange, SessionSummary};
use crate::repositories::{ChatMessageRepo, ChatSessionRepo};
use crate::DbPool;

/// [`SessionStore`] backed by the Postgres repositories.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn list_sessions(&self, owner_id: DbId) -> Result<Vec<SessionSummary>, sqlx::Error> {
        ChatSessionRepo::list_for_owner(&self.pool, owner_id).await
    }

    async fn find_session(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        ChatSessionRepo::find_for_owner(&self.pool, session_id, owner_id).await
    }

    async fn history(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<Vec<ChatMessage>>, sqlx::Error> {
        if ChatSessionRepo::find_for_owner(&self.pool, session_id, owner_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }
        // Exchanges are committed as pairs in one transaction, so any snapshot
        // read here ends on an assistant message.
        let messages = ChatMessageRepo::list_for_session(&self.pool, session_id).await?;
        Ok(Some(messages))
    }

    async fn delete_session(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        ChatSessionRepo::delete_for_owner(&self.pool, session_id, owner_id).await
    }

    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<Option<CommittedExchange>, sqlx::Error> {
        ChatSessionRepo::commit_exchange(&self.pool, &exchange).await
    }

    async fn health_check(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
