//! Route definitions for the `/chat` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{chat, sessions, suggestions};
use crate::state::AppState;

/// Routes mounted at `/chat`.
///
/// ```text
/// POST   /stream                -> stream_reply
/// GET    /sessions              -> list_sessions
/// GET    /sessions/{id}         -> get_session
/// DELETE /sessions/{id}         -> delete_session
/// GET    /suggestions           -> get_suggestions (?context=)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stream", post(chat::stream_reply))
        .route("/sessions", get(sessions::list_sessions))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/suggestions", get(suggestions::get_suggestions))
}
