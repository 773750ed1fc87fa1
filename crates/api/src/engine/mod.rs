//! Reply generation.
//!
//! The language model is an opaque capability behind [`ReplyGenerator`]: given
//! the conversation so far it yields ordered text deltas and then exactly one
//! final verdict carrying the authoritative reply text.
//!
//! - [`scripted`] -- deterministic canned replies (default for development).
//! - [`openai`] -- an OpenAI-compatible streaming chat-completions client.
//! - [`in_flight`] -- the "one active exchange per session" registry.

pub mod in_flight;
pub mod openai;
pub mod scripted;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use hrchat_core::context::ChatContext;
use hrchat_core::message::MessageRole;
use hrchat_core::protocol::{ERROR_GENERATION_FAILED, ERROR_TIMEOUT};

use crate::config::{GenerationConfig, GeneratorBackend};

pub use in_flight::{InFlightPermit, InFlightRegistry};
pub use openai::OpenAiGenerator;
pub use scripted::ScriptedGenerator;

/// One prior message replayed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

/// Everything a generator needs to produce one reply.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Routing hint for this message (not necessarily the session's context).
    pub context: ChatContext,
    /// Earlier messages of the session in sequence order, oldest first.
    pub history: Vec<HistoryTurn>,
    /// The new user message, already trimmed.
    pub content: String,
}

impl GenerationRequest {
    /// System instructions for the routed context.
    pub fn instructions(&self) -> &'static str {
        self.context.instructions()
    }
}

/// An item produced by a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// The next piece of the reply, in order.
    Delta(String),
    /// Final verdict. The text may differ from the joined deltas
    /// (normalization, trimming) and is the one that gets persisted.
    Completed { full_text: String },
}

/// Ordered generation output. Ends right after [`GenerationEvent::Completed`].
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationEvent, GenerationError>> + Send>>;

/// Failures of the generation capability.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not decode generator output: {0}")]
    Decode(String),

    #[error("Generation ended without a final reply")]
    Incomplete,

    #[error("Generator produced an empty reply")]
    EmptyReply,
}

impl GenerationError {
    /// Error code carried by the terminal event.
    pub fn terminal_code(&self) -> &'static str {
        match self {
            GenerationError::Timeout(_) => ERROR_TIMEOUT,
            _ => ERROR_GENERATION_FAILED,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Transport(err.to_string())
    }
}

impl From<reqwest_eventsource::Error> for GenerationError {
    fn from(err: reqwest_eventsource::Error) -> Self {
        use reqwest_eventsource::Error;

        match err {
            Error::StreamEnded => GenerationError::Incomplete,
            Error::Transport(err) => err.into(),
            Error::InvalidStatusCode(status, _) => GenerationError::Upstream {
                status: status.as_u16(),
                message: status.to_string(),
            },
            other => GenerationError::Decode(other.to_string()),
        }
    }
}

/// The generation capability.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Start generating a reply. Errors returned here happen before any delta.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the configured generator backend.
pub fn build_generator(config: &GenerationConfig) -> Arc<dyn ReplyGenerator> {
    match config.backend {
        GeneratorBackend::Scripted => Arc::new(ScriptedGenerator::new(Duration::from_millis(
            config.scripted_delay_ms,
        ))),
        GeneratorBackend::OpenAi => Arc::new(OpenAiGenerator::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
        )),
    }
}
