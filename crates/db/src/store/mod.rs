//! The session store seam.
//!
//! The streaming gateway and the HTTP handlers talk to a [`SessionStore`]
//! rather than to the repositories directly, so the server can run against
//! Postgres ([`PgSessionStore`]) or, without a `DATABASE_URL`, against the
//! process-local [`MemorySessionStore`].
//!
//! "Not found" and "not owned" are both expressed as `None` / `false`; errors
//! are reserved for infrastructure failures.

mod memory;
mod pg;

pub use memory::MemorySessionStore;
pub use pg::PgSessionStore;

use async_trait::async_trait;
use hrchat_core::types::DbId;

use crate::models::chat_message::ChatMessage;
use crate::models::chat_session::{ChatSession, CommittedExchange, NewExchange, SessionSummary};

/// Durable, append-only record of chat sessions and their messages.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Owner's sessions, most recently active first.
    async fn list_sessions(&self, owner_id: DbId) -> Result<Vec<SessionSummary>, sqlx::Error>;

    /// A session if it exists and belongs to `owner_id`.
    async fn find_session(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error>;

    /// Messages of an owned session in sequence order, or `None`.
    async fn history(
        &self,
        owner_id: DbId,
        session_id: DbId,
    ) -> Result<Option<Vec<ChatMessage>>, sqlx::Error>;

    /// Delete an owned session and its messages. `false` when nothing matched.
    async fn delete_session(&self, owner_id: DbId, session_id: DbId)
        -> Result<bool, sqlx::Error>;

    /// Atomically persist a completed exchange. `None` when the target session
    /// no longer exists for this owner; nothing is written in that case.
    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<Option<CommittedExchange>, sqlx::Error>;

    /// Whether the backing storage is reachable.
    async fn health_check(&self) -> Result<(), sqlx::Error>;

    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}
