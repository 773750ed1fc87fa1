//! Client-side transcript and exchange state machine.
//!
//! [`Conversation`] performs no I/O. Every mutation that belongs to an
//! exchange takes the exchange's [`Ticket`]; a ticket that is no longer the
//! pending one (after "new chat", switching sessions, or a finished exchange)
//! is answered with [`Outcome::Stale`] and changes nothing.
//!
//! Phases of the pending exchange:
//!
//! ```text
//! Idle -> Sending -> Streaming -> Completed
//!            \           \-----> Errored
//!             \------------------^
//! ```

use std::collections::HashMap;
use std::fmt;

use hrchat_core::context::ChatContext;
use hrchat_core::message::{validate_content, MessageRole};
use hrchat_core::protocol::{Terminal, ERROR_TIMEOUT};
use hrchat_core::types::DbId;
use uuid::Uuid;

use crate::model::{OutgoingMessage, SessionHistory};

/// Shown in place of a reply that failed.
pub const FAILURE_MESSAGE: &str =
    "Desculpe, não consegui responder agora. Tente novamente em instantes.";

/// Shown in place of a reply that took too long.
pub const TIMEOUT_MESSAGE: &str = "A resposta demorou mais do que o esperado. Tente novamente.";

/// Temporary id of a pending exchange's placeholder entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(Uuid);

impl Ticket {
    pub fn id(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Request sent, no fragment yet.
    Sending,
    Streaming,
    Completed,
    Errored,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Sending | Phase::Streaming)
    }
}

/// How an exchange failed, as far as the transcript cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Failed,
}

impl FailureKind {
    /// Classify a terminal error code.
    pub fn from_code(code: &str) -> Self {
        if code == ERROR_TIMEOUT {
            FailureKind::Timeout
        } else {
            FailureKind::Failed
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            FailureKind::Timeout => TIMEOUT_MESSAGE,
            FailureKind::Failed => FAILURE_MESSAGE,
        }
    }
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Client-side id, stable for the entry's lifetime.
    pub temp_id: Uuid,
    /// Server id once known (loaded history, or a completed exchange).
    pub durable_id: Option<DbId>,
    pub role: MessageRole,
    pub content: String,
    /// Set on the placeholder while the reply is arriving.
    pub streaming: bool,
}

/// What [`Conversation::begin_send`] hands to the transport.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub ticket: Ticket,
    pub message: OutgoingMessage,
}

/// Result of applying an exchange event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fragment was appended.
    Applied,
    /// The exchange finished and was reconciled with the server's text.
    Completed { session_id: DbId, new_session: bool },
    /// The exchange failed; the placeholder now shows a localized message.
    Failed(FailureKind),
    /// The ticket is not the pending exchange. Nothing changed.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: Ticket,
    user_entry: Uuid,
}

/// Transcript of the open session plus the state of its pending exchange.
#[derive(Debug)]
pub struct Conversation {
    context: ChatContext,
    session_id: Option<DbId>,
    entries: Vec<TranscriptEntry>,
    pending: Option<Pending>,
    phase: Phase,
    durable_ids: HashMap<Uuid, DbId>,
}

impl Conversation {
    pub fn new(context: ChatContext) -> Self {
        Self {
            context,
            session_id: None,
            entries: Vec::new(),
            pending: None,
            phase: Phase::Idle,
            durable_ids: HashMap::new(),
        }
    }

    pub fn context(&self) -> ChatContext {
        self.context
    }

    /// Context sent with the next message.
    pub fn set_context(&mut self, context: ChatContext) {
        self.context = context;
    }

    pub fn session_id(&self) -> Option<DbId> {
        self.session_id
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn pending_ticket(&self) -> Option<Ticket> {
        self.pending.map(|p| p.ticket)
    }

    /// Server id assigned to a client entry, once the exchange completed.
    pub fn durable_id(&self, temp_id: Uuid) -> Option<DbId> {
        self.durable_ids.get(&temp_id).copied()
    }

    /// Start an exchange: add the optimistic user entry and a streaming
    /// placeholder, and return what to send.
    ///
    /// Returns `None` (and changes nothing) while another exchange is in
    /// flight or when the content is blank.
    pub fn begin_send(&mut self, content: &str) -> Option<SendRequest> {
        if self.is_busy() {
            return None;
        }
        let content = validate_content(content).ok()?.to_string();

        let user_entry = Uuid::new_v4();
        let ticket = Ticket(Uuid::new_v4());
        self.entries.push(TranscriptEntry {
            temp_id: user_entry,
            durable_id: None,
            role: MessageRole::User,
            content: content.clone(),
            streaming: false,
        });
        self.entries.push(TranscriptEntry {
            temp_id: ticket.0,
            durable_id: None,
            role: MessageRole::Assistant,
            content: String::new(),
            streaming: true,
        });
        self.pending = Some(Pending { ticket, user_entry });
        self.phase = Phase::Sending;

        Some(SendRequest {
            ticket,
            message: OutgoingMessage {
                content,
                session_id: self.session_id,
                context: self.context,
            },
        })
    }

    /// Append a fragment to the placeholder.
    pub fn apply_fragment(&mut self, ticket: Ticket, delta: &str) -> Outcome {
        if !self.is_pending(ticket) {
            return Outcome::Stale;
        }
        if let Some(entry) = self.entry_mut(ticket.0) {
            entry.content.push_str(delta);
        }
        self.phase = Phase::Streaming;
        Outcome::Applied
    }

    /// Reconcile with the terminal event.
    pub fn apply_terminal(&mut self, ticket: Ticket, terminal: Terminal) -> Outcome {
        let Some(pending) = self.pending.filter(|p| p.ticket == ticket) else {
            return Outcome::Stale;
        };

        match terminal {
            Terminal::Completed(done) => {
                if let Some(entry) = self.entry_mut(ticket.0) {
                    entry.content = done.full_text;
                    entry.streaming = false;
                    entry.durable_id = Some(done.assistant_message_id);
                }
                if let Some(entry) = self.entry_mut(pending.user_entry) {
                    entry.durable_id = Some(done.user_message_id);
                }
                self.durable_ids
                    .insert(pending.user_entry, done.user_message_id);
                self.durable_ids.insert(ticket.0, done.assistant_message_id);

                let new_session = self.session_id != Some(done.session_id);
                self.session_id = Some(done.session_id);
                self.pending = None;
                self.phase = Phase::Completed;
                Outcome::Completed {
                    session_id: done.session_id,
                    new_session,
                }
            }
            Terminal::Failed { error } => self.fail(ticket, FailureKind::from_code(&error)),
        }
    }

    /// Mark the exchange failed without a terminal (transport error, client
    /// timeout, rejected request).
    pub fn apply_failure(&mut self, ticket: Ticket, kind: FailureKind) -> Outcome {
        if !self.is_pending(ticket) {
            return Outcome::Stale;
        }
        self.fail(ticket, kind)
    }

    /// "New chat": drop the transcript and any pending exchange. Returns the
    /// ticket that was abandoned, if any.
    pub fn reset(&mut self) -> Option<Ticket> {
        let abandoned = self.pending.take().map(|p| p.ticket);
        self.session_id = None;
        self.entries.clear();
        self.durable_ids.clear();
        self.phase = Phase::Idle;
        abandoned
    }

    /// Replace the transcript with a stored session. Any pending exchange is
    /// abandoned. The session's stored context becomes the current one.
    pub fn load_session(&mut self, history: &SessionHistory) -> Option<Ticket> {
        let abandoned = self.reset();
        self.session_id = Some(history.session.id);
        self.context = ChatContext::from_param(Some(&history.session.context));

        for message in &history.messages {
            let Some(role) = MessageRole::parse(&message.role) else {
                tracing::warn!(message_id = message.id, role = %message.role, "Skipping message with unknown role");
                continue;
            };
            let temp_id = Uuid::new_v4();
            self.durable_ids.insert(temp_id, message.id);
            self.entries.push(TranscriptEntry {
                temp_id,
                durable_id: Some(message.id),
                role,
                content: message.content.clone(),
                streaming: false,
            });
        }
        abandoned
    }

    fn is_pending(&self, ticket: Ticket) -> bool {
        self.pending.is_some_and(|p| p.ticket == ticket)
    }

    fn entry_mut(&mut self, temp_id: Uuid) -> Option<&mut TranscriptEntry> {
        self.entries.iter_mut().find(|e| e.temp_id == temp_id)
    }

    fn fail(&mut self, ticket: Ticket, kind: FailureKind) -> Outcome {
        if let Some(entry) = self.entry_mut(ticket.0) {
            entry.content = kind.message().to_string();
            entry.streaming = false;
        }
        self.pending = None;
        self.phase = Phase::Errored;
        Outcome::Failed(kind)
    }
}
