//! Wire format of a streaming exchange.
//!
//! The body is `text/event-stream`. Every reply fragment is an SSE event named
//! [`EVENT_FRAGMENT`] whose data is the raw delta text. The stream ends with
//! exactly one [`EVENT_DONE`] event whose data is a JSON terminal object that
//! always carries `"done": true`, plus either the authoritative reply
//! (`session_id`, `full_text`, message ids) or an `error` code.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// SSE event name for a reply fragment.
pub const EVENT_FRAGMENT: &str = "fragment";

/// SSE event name for the terminal sentinel.
pub const EVENT_DONE: &str = "done";

/// Generation exceeded the server-side time bound.
pub const ERROR_TIMEOUT: &str = "timeout";
/// The generation capability failed or ended without a final verdict.
pub const ERROR_GENERATION_FAILED: &str = "generation_failed";
/// The exchange completed but could not be committed.
pub const ERROR_PERSISTENCE_FAILED: &str = "persistence_failed";
/// The session was deleted while the reply was being generated.
pub const ERROR_SESSION_DELETED: &str = "session_deleted";

/// Errors decoding a streaming event.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed terminal payload: {0}")]
    MalformedTerminal(#[from] serde_json::Error),

    #[error("Terminal payload is missing `{0}`")]
    MissingField(&'static str),
}

/// Success payload of a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedExchange {
    /// Session the exchange was committed to (newly created or existing).
    pub session_id: DbId,
    /// Authoritative reply text. Replaces whatever the client concatenated.
    pub full_text: String,
    /// Durable id of the committed user message.
    pub user_message_id: DbId,
    /// Durable id of the committed assistant message.
    pub assistant_message_id: DbId,
}

/// The single event that ends a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TerminalWire", try_from = "TerminalWire")]
pub enum Terminal {
    Completed(CompletedExchange),
    Failed { error: String },
}

impl Terminal {
    pub fn failed(error: impl Into<String>) -> Self {
        Terminal::Failed {
            error: error.into(),
        }
    }

    /// Serialize to the JSON carried in the `done` event.
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"done\":true,\"error\":\"{ERROR_GENERATION_FAILED}\"}}")
        })
    }

    pub fn from_json(data: &str) -> Result<Self, ProtocolError> {
        let wire: TerminalWire = serde_json::from_str(data)?;
        Terminal::try_from(wire)
    }
}

/// Flat JSON shape of a terminal, `{done: true, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TerminalWire {
    done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_message_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assistant_message_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Terminal> for TerminalWire {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Completed(done) => TerminalWire {
                done: true,
                session_id: Some(done.session_id),
                full_text: Some(done.full_text),
                user_message_id: Some(done.user_message_id),
                assistant_message_id: Some(done.assistant_message_id),
                error: None,
            },
            Terminal::Failed { error } => TerminalWire {
                done: true,
                session_id: None,
                full_text: None,
                user_message_id: None,
                assistant_message_id: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<TerminalWire> for Terminal {
    type Error = ProtocolError;

    fn try_from(wire: TerminalWire) -> Result<Self, Self::Error> {
        if !wire.done {
            return Err(ProtocolError::MissingField("done"));
        }
        if let Some(error) = wire.error {
            return Ok(Terminal::Failed { error });
        }
        Ok(Terminal::Completed(CompletedExchange {
            session_id: wire
                .session_id
                .ok_or(ProtocolError::MissingField("session_id"))?,
            full_text: wire
                .full_text
                .ok_or(ProtocolError::MissingField("full_text"))?,
            user_message_id: wire
                .user_message_id
                .ok_or(ProtocolError::MissingField("user_message_id"))?,
            assistant_message_id: wire
                .assistant_message_id
                .ok_or(ProtocolError::MissingField("assistant_message_id"))?,
        }))
    }
}

/// One decoded event of a streaming exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment { delta: String },
    Done(Terminal),
}

impl StreamEvent {
    /// Map an SSE `(event, data)` pair to a stream event.
    ///
    /// Unknown event names (keep-alive comments never reach here) yield
    /// `Ok(None)` so servers can add event kinds without breaking clients.
    pub fn from_sse(event: &str, data: &str) -> Result<Option<Self>, ProtocolError> {
        match event {
            EVENT_FRAGMENT => Ok(Some(StreamEvent::Fragment {
                delta: data.to_string(),
            })),
            EVENT_DONE => Terminal::from_json(data).map(|t| Some(StreamEvent::Done(t))),
            _ => Ok(None),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_))
    }
}
