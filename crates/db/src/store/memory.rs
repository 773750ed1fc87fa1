use std::collections::HashMap;

use async_trait::async_trait;
use hrchat_core::message::MessageRole;
use hrchat_core::types::DbId;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::models::chat_message::ChatMessage;
use crate::models::chat_session::{ChatSession, CommittedExchange, NewExchange, SessionSummary};

#[derive(Default)]
struct Inner {
    last_session_id: DbId,
    last_message_id: DbId,
    sessions: HashMap<DbId, ChatSession>,
    messages: HashMap<DbId, Vec<ChatMessage>>,
}

impl Inner {
    fn owned(&self, owner_id: DbId, session_id: DbId) -> Option<&ChatSession> {
        self.sessions
            .get(&session_id)
            .filter(|session| session.owner_id == owner_id)
    }

    fn push_message(&mut self, session_id: DbId, role: MessageRole, content: &str) -> ChatMessage {
        self.last_message_id += 1;
        let messages = self.messages.entry(session_id).or_default();
        let sequence = messages.last().map_or(1, |m| m.sequence + 1);
        let message = ChatMessage {
            id: self.last_message_id,
            session_id,
            role: role.as_str().to_string(),
            content: content.to_string(),
            sequence,
            created_at: chrono::Utc::now(),
        };
        messages.push(message.clone());
        message
    }
}

/// Process-local [`SessionStore`].
///
/// A single write lock covers each commit, which gives the same all-or-nothing
/// visibility as the Postgres transaction. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<Inner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_sessions(&self, owner_id: DbId) -> Result<Vec<SessionSummary>, sqlx::Error> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<&ChatSession> = inner
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .collect();
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    async fn find_session(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        Ok(self.inner.read().await.owned(owner_id, session_id).cloned())
    }

    async fn history(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<Vec<ChatMessage>>, sqlx::Error> {
        let inner = self.inner.read().await;
        if inner.owned(owner_id, session_id).is_none() {
            return Ok(None);
        }
        Ok(Some(
            inner.messages.get(&session_id).cloned().unwrap_or_default(),
        ))
    }

    async fn delete_session(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut inner = self.inner.write().await;
        if inner.owned(owner_id, session_id).is_none() {
            return Ok(false);
        }
        inner.sessions.remove(&session_id);
        inner.messages.remove(&session_id);
        Ok(true)
    }

    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<Option<CommittedExchange>, sqlx::Error> {
        let mut inner = self.inner.write().await;
        let now = chrono::Utc::now();

        let session_id = match exchange.session_id {
            None => {
                inner.last_session_id += 1;
                let session = ChatSession {
                    id: inner.last_session_id,
                    owner_id: exchange.owner_id,
                    title: exchange.title.clone(),
                    context: exchange.context.as_str().to_string(),
                    created_at: now,
                    updated_at: now,
                };
                inner.sessions.insert(session.id, session);
                inner.last_session_id
            }
            Some(id) => {
                if inner.owned(exchange.owner_id, id).is_none() {
                    return Ok(None);
                }
                id
            }
        };

        let user_message =
            inner.push_message(session_id, MessageRole::User, &exchange.user_content);
        let assistant_message = inner.push_message(
            session_id,
            MessageRole::Assistant,
            &exchange.assistant_content,
        );

        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        session.updated_at = now;
        let session = session.clone();

        Ok(Some(CommittedExchange {
            session,
            user_message,
            assistant_message,
        }))
    }

    async fn health_check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
