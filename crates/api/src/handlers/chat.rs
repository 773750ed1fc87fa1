//! Handler for the streaming exchange endpoint.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use hrchat_core::context::ChatContext;
use hrchat_core::protocol::{StreamEvent, EVENT_DONE, EVENT_FRAGMENT};
use hrchat_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extract::JsonBody;
use crate::gateway::ExchangeRequest;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Request body for `POST /chat/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamReplyBody {
    pub content: String,
    #[serde(default)]
    pub session_id: Option<DbId>,
    /// Unknown or missing values fall back to `general`.
    #[serde(default)]
    pub context: Option<String>,
}

/// POST /api/v1/chat/stream
///
/// Unreadable bodies, validation, ownership and conflict errors are returned
/// as regular JSON errors. Once the `text/event-stream` body starts, the `done` event carries
/// success or failure.
pub async fn stream_reply(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<StreamReplyBody>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let request = ExchangeRequest {
        content: body.content,
        session_id: body.session_id,
        context: ChatContext::from_param(body.context.as_deref()),
    };

    let events = state.gateway.open(auth.user_id, request).await?;
    let stream = events.map(|event| Ok::<_, Infallible>(to_sse_event(event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Fragment { delta } => Event::default()
            .event(EVENT_FRAGMENT)
            .data(normalize_newlines(&delta)),
        StreamEvent::Done(terminal) => Event::default().event(EVENT_DONE).data(terminal.to_json()),
    }
}

/// SSE data lines cannot carry `\r`; fold CRLF and lone CR into `\n`, which
/// the encoder splits into multiple `data:` lines.
fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_carriage_returns() {
        assert_eq!(normalize_newlines("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_newlines("plain"), "plain");
    }
}
