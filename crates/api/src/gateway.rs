//! The streaming gateway: one user message in, ordered fragments and a single
//! terminal out.
//!
//! [`StreamingGateway::open`] performs every check that can fail with an HTTP
//! status (validation, ownership, the in-flight guard) before a stream exists.
//! Everything after that runs in a spawned exchange task and is reported
//! through the terminal event instead.
//!
//! The exchange is committed only after the generator's final verdict, and
//! only if the client is still listening. A disconnect before that point
//! leaves nothing behind, so the same message can simply be sent again.
//!
//! A client that drops between the commit and the delivery of the terminal
//! never learns the exchange succeeded, and resending would store the pair
//! twice. The window is logged; clients can tell by reloading the session's
//! history before retrying.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hrchat_core::context::ChatContext;
use hrchat_core::error::CoreError;
use hrchat_core::message::{derive_title, validate_content};
use hrchat_core::protocol::{
    CompletedExchange, StreamEvent, Terminal, ERROR_PERSISTENCE_FAILED, ERROR_SESSION_DELETED,
};
use hrchat_core::types::DbId;
use hrchat_db::models::chat_message::ChatMessage;
use hrchat_db::models::chat_session::NewExchange;
use hrchat_db::store::SessionStore;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::engine::{
    GenerationError, GenerationEvent, GenerationRequest, HistoryTurn, InFlightPermit,
    InFlightRegistry, ReplyGenerator,
};
use crate::error::AppResult;

/// Buffered events between the exchange task and the HTTP body.
const EVENT_BUFFER: usize = 32;

/// Ordered events of one exchange, ending with [`StreamEvent::Done`].
pub type ReplyStream = ReceiverStream<StreamEvent>;

/// A request to start one exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    /// Raw user text; trimmed and validated by the gateway.
    pub content: String,
    /// Existing session to continue. `None` starts a new one.
    pub session_id: Option<DbId>,
    /// Routing hint for this message. Also the stored context of a new session.
    pub context: ChatContext,
}

/// Drives exchanges between the generator and the session store.
#[derive(Clone)]
pub struct StreamingGateway {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn ReplyGenerator>,
    in_flight: Arc<InFlightRegistry>,
    timeout: Duration,
    history_window: usize,
}

impl StreamingGateway {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn ReplyGenerator>,
        timeout: Duration,
        history_window: usize,
    ) -> Self {
        Self {
            store,
            generator,
            in_flight: Arc::new(InFlightRegistry::new()),
            timeout,
            history_window,
        }
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    /// Start an exchange for `owner_id`.
    ///
    /// Fails with `Validation` for blank or oversized content, `NotFound` when
    /// the session is unknown or owned by someone else, and `Conflict` when
    /// the session already has an exchange in flight. On success the returned
    /// stream yields fragments in generation order and then exactly one
    /// terminal.
    pub async fn open(&self, owner_id: DbId, request: ExchangeRequest) -> AppResult<ReplyStream> {
        let content = validate_content(&request.content)
            .map_err(CoreError::Validation)?
            .to_string();

        let (history, permit) = match request.session_id {
            Some(session_id) => {
                let messages = self
                    .store
                    .history(owner_id, session_id)
                    .await?
                    .ok_or_else(|| CoreError::session_not_found(session_id))?;

                let permit = self.in_flight.try_acquire(session_id).ok_or_else(|| {
                    tracing::warn!(owner_id, session_id, "Rejected concurrent exchange");
                    CoreError::exchange_in_flight(session_id)
                })?;
                (messages, Some(permit))
            }
            // A session that does not exist yet cannot be targeted by anyone else.
            None => (Vec::new(), None),
        };

        let generation = GenerationRequest {
            context: request.context,
            history: self.replay_window(&history),
            content: content.clone(),
        };

        let exchange = Exchange {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            timeout: self.timeout,
            owner_id,
            session_id: request.session_id,
            context: request.context,
            content,
            generation,
            _permit: permit,
        };

        let span = tracing::info_span!(
            "exchange",
            owner_id,
            session_id = ?request.session_id,
            context = %request.context,
            generator = self.generator.name(),
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(exchange.run(tx).instrument(span));

        Ok(ReceiverStream::new(rx))
    }

    /// The last `history_window` messages, oldest first.
    fn replay_window(&self, history: &[ChatMessage]) -> Vec<HistoryTurn> {
        let skip = history.len().saturating_sub(self.history_window);
        history[skip..]
            .iter()
            .filter_map(|message| {
                Some(HistoryTurn {
                    role: message.role()?,
                    content: message.content.clone(),
                })
            })
            .collect()
    }
}

/// Why driving the generator stopped early.
#[derive(Debug)]
enum DriveError {
    /// The receiving side of the stream is gone.
    Disconnected,
    Generation(GenerationError),
}

impl From<GenerationError> for DriveError {
    fn from(err: GenerationError) -> Self {
        DriveError::Generation(err)
    }
}

/// Everything one spawned exchange task owns.
struct Exchange {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn ReplyGenerator>,
    timeout: Duration,
    owner_id: DbId,
    session_id: Option<DbId>,
    context: ChatContext,
    content: String,
    generation: GenerationRequest,
    /// Held until the task ends, including on panic.
    _permit: Option<InFlightPermit>,
}

impl Exchange {
    async fn run(self, tx: mpsc::Sender<StreamEvent>) {
        tracing::info!("Exchange opened");

        let generation = self.generation.clone();
        let driven =
            tokio::time::timeout(self.timeout, drive(self.generator.as_ref(), generation, &tx))
                .await;

        let full_text = match driven {
            Ok(Ok(full_text)) => full_text,
            Ok(Err(DriveError::Disconnected)) => {
                tracing::info!("Client disconnected mid-stream, exchange abandoned");
                return;
            }
            Ok(Err(DriveError::Generation(err))) => return fail(&tx, err).await,
            Err(_) => return fail(&tx, GenerationError::Timeout(self.timeout)).await,
        };

        if tx.is_closed() {
            tracing::info!("Client disconnected before commit, exchange abandoned");
            return;
        }

        let terminal = self.commit(full_text).await;
        let committed = matches!(terminal, Terminal::Completed(_));
        if !send_terminal(&tx, terminal).await && committed {
            tracing::warn!("Exchange committed but client left before the terminal");
        }
    }

    async fn commit(&self, full_text: String) -> Terminal {
        let exchange = NewExchange {
            owner_id: self.owner_id,
            session_id: self.session_id,
            title: derive_title(&self.content),
            context: self.context,
            user_content: self.content.clone(),
            assistant_content: full_text.clone(),
        };

        match self.store.commit_exchange(exchange).await {
            Ok(Some(committed)) => {
                tracing::info!(
                    session_id = committed.session.id,
                    user_message_id = committed.user_message.id,
                    assistant_message_id = committed.assistant_message.id,
                    "Exchange committed"
                );
                Terminal::Completed(CompletedExchange {
                    session_id: committed.session.id,
                    full_text,
                    user_message_id: committed.user_message.id,
                    assistant_message_id: committed.assistant_message.id,
                })
            }
            Ok(None) => {
                tracing::warn!("Session deleted during generation, nothing persisted");
                Terminal::failed(ERROR_SESSION_DELETED)
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to commit exchange");
                Terminal::failed(ERROR_PERSISTENCE_FAILED)
            }
        }
    }
}

/// Forward generator deltas to `tx` and return the authoritative text.
async fn drive(
    generator: &dyn ReplyGenerator,
    request: GenerationRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<String, DriveError> {
    let mut stream = generator.generate(request).await?;

    while let Some(item) = stream.next().await {
        match item? {
            GenerationEvent::Delta(delta) => {
                if delta.is_empty() {
                    continue;
                }
                tx.send(StreamEvent::Fragment { delta })
                    .await
                    .map_err(|_| DriveError::Disconnected)?;
            }
            GenerationEvent::Completed { full_text } => {
                if full_text.trim().is_empty() {
                    return Err(GenerationError::EmptyReply.into());
                }
                return Ok(full_text);
            }
        }
    }

    Err(GenerationError::Incomplete.into())
}

async fn fail(tx: &mpsc::Sender<StreamEvent>, err: GenerationError) {
    tracing::warn!(error = %err, code = err.terminal_code(), "Generation failed");
    send_terminal(tx, Terminal::failed(err.terminal_code())).await;
}

/// Whether the terminal reached the stream.
async fn send_terminal(tx: &mpsc::Sender<StreamEvent>, terminal: Terminal) -> bool {
    let delivered = tx.send(StreamEvent::Done(terminal)).await.is_ok();
    if !delivered {
        tracing::debug!("Client gone before terminal could be delivered");
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrchat_db::store::MemorySessionStore;

    use crate::engine::ScriptedGenerator;

    fn gateway(window: usize) -> StreamingGateway {
        StreamingGateway::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(ScriptedGenerator::new(Duration::ZERO)),
            Duration::from_secs(5),
            window,
        )
    }

    fn message(sequence: i32, role: &str) -> ChatMessage {
        ChatMessage {
            id: sequence.into(),
            session_id: 1,
            role: role.into(),
            content: format!("m{sequence}"),
            sequence,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn replay_window_keeps_most_recent_messages_in_order() {
        let history: Vec<_> = (1..=6)
            .map(|n| message(n, if n % 2 == 1 { "user" } else { "assistant" }))
            .collect();

        let turns = gateway(4).replay_window(&history);
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn replay_window_larger_than_history_keeps_everything() {
        let history = vec![message(1, "user"), message(2, "assistant")];
        assert_eq!(gateway(20).replay_window(&history).len(), 2);
    }
}
