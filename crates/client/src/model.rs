//! Response payloads as the client sees them.

use chrono::{DateTime, Utc};
use hrchat_core::context::ChatContext;
use hrchat_core::types::DbId;
use serde::{Deserialize, Serialize};

/// One entry of `GET /chat/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionSummary {
    pub id: DbId,
    pub title: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    pub id: DbId,
    pub title: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    pub id: DbId,
    pub role: String,
    pub content: String,
    pub sequence: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload of `GET /chat/sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionHistory {
    pub session: SessionInfo,
    pub messages: Vec<HistoryMessage>,
}

/// Body of `POST /chat/stream`.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<DbId>,
    pub context: ChatContext,
}

/// `{ "data": T }` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// `{ "error", "code" }` error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    pub code: String,
}
