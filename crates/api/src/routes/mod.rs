pub mod chat;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /chat/stream                 streaming exchange (POST, SSE)
/// /chat/sessions               list (auth required)
/// /chat/sessions/{id}          history, delete (auth required)
/// /chat/suggestions            quick-start prompts (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/chat", chat::router())
}
