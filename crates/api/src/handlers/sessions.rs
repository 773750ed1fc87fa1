//! Handlers for the `/chat/sessions` resource.
//!
//! Every lookup is scoped to the authenticated owner. A session owned by
//! someone else answers exactly like one that does not exist.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hrchat_core::error::CoreError;
use hrchat_core::types::DbId;
use hrchat_db::models::chat_message::ChatMessage;
use hrchat_db::models::chat_session::{ChatSession, SessionSummary};
use serde::Serialize;

use crate::error::AppResult;
use crate::extract::PathParam;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Payload of `GET /chat/sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionHistory {
    pub session: ChatSession,
    /// Ordered by `sequence`.
    pub messages: Vec<ChatMessage>,
}

/// GET /api/v1/chat/sessions
///
/// Sessions with at least one completed exchange, most recently active first.
pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<SessionSummary>>>> {
    let sessions = state.store.list_sessions(auth.user_id).await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /api/v1/chat/sessions/{id}
pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<Json<DataResponse<SessionHistory>>> {
    let session = state
        .store
        .find_session(auth.user_id, id)
        .await?
        .ok_or_else(|| CoreError::session_not_found(id))?;

    // Deleted between the two reads.
    let messages = state
        .store
        .history(auth.user_id, id)
        .await?
        .ok_or_else(|| CoreError::session_not_found(id))?;

    Ok(Json(DataResponse {
        data: SessionHistory { session, messages },
    }))
}

/// DELETE /api/v1/chat/sessions/{id}
///
/// Removes the session and all its messages. Not idempotent: deleting again
/// returns 404.
pub async fn delete_session(
    auth: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<StatusCode> {
    if state.store.delete_session(auth.user_id, id).await? {
        tracing::info!(owner_id = auth.user_id, session_id = id, "Chat session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::session_not_found(id).into())
    }
}
