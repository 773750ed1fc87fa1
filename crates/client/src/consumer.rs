//! Drives a [`Conversation`] against a [`ChatTransport`].
//!
//! Each exchange gets a reader task that forwards `(ticket, event)` pairs over
//! a channel. The consumer owns the only receiver and applies events to the
//! conversation in arrival order; pairs whose ticket has been superseded are
//! dropped by the conversation as stale. Replacing the transcript (new chat,
//! opening or deleting the open session) cancels the reader, but only once
//! the server has answered: a failed history fetch or delete leaves the
//! exchange in flight untouched.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hrchat_core::context::ChatContext;
use hrchat_core::protocol::StreamEvent;
use hrchat_core::suggestions::SuggestionGroup;
use hrchat_core::types::DbId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::conversation::{Conversation, FailureKind, Outcome, Ticket};
use crate::error::ClientError;
use crate::model::SessionSummary;
use crate::transport::{suggestions_or_fallback, ChatTransport, EventStream};

/// How long to wait for the next event before giving up on an exchange.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(45);

type TicketedEvent = (Ticket, Result<StreamEvent, ClientError>);

struct Reader {
    ticket: Ticket,
    cancel: CancellationToken,
}

pub struct StreamConsumer {
    transport: Arc<dyn ChatTransport>,
    conversation: Conversation,
    sessions: Vec<SessionSummary>,
    events_tx: mpsc::Sender<TicketedEvent>,
    events_rx: mpsc::Receiver<TicketedEvent>,
    reader: Option<Reader>,
    idle_timeout: Duration,
}

impl StreamConsumer {
    pub fn new(transport: Arc<dyn ChatTransport>, context: ChatContext) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            transport,
            conversation: Conversation::new(context),
            sessions: Vec::new(),
            events_tx,
            events_rx,
            reader: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn set_context(&mut self, context: ChatContext) {
        self.conversation.set_context(context);
    }

    /// Session list as of the last refresh.
    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    /// Send a message. Returns `None` without contacting the server while an
    /// exchange is already in flight or when the content is blank.
    ///
    /// A request the server rejects up front (validation, conflict, unknown
    /// session) or cannot be reached for is shown like a failed reply.
    pub async fn send(&mut self, content: &str) -> Option<Ticket> {
        let request = self.conversation.begin_send(content)?;
        let ticket = request.ticket;

        match self.transport.open_exchange(&request.message).await {
            Ok(stream) => self.spawn_reader(ticket, stream),
            Err(err) => {
                tracing::warn!(%ticket, error = %err, "Could not open exchange");
                self.conversation
                    .apply_failure(ticket, FailureKind::Failed);
            }
        }
        Some(ticket)
    }

    /// Wait for the next event of the pending exchange and apply it.
    ///
    /// Returns `None` when no exchange is pending. Stale events are skipped.
    pub async fn pump(&mut self) -> Option<Outcome> {
        loop {
            let pending = self.conversation.pending_ticket()?;

            let received = tokio::time::timeout(self.idle_timeout, self.events_rx.recv()).await;
            let (ticket, item) = match received {
                Ok(Some(pair)) => pair,
                // The consumer holds a sender, so the channel never closes.
                Ok(None) => return None,
                Err(_) => {
                    tracing::warn!(ticket = %pending, "No reply event within idle timeout");
                    self.cancel_reader();
                    return Some(
                        self.conversation
                            .apply_failure(pending, FailureKind::Timeout),
                    );
                }
            };

            let outcome = match item {
                Ok(StreamEvent::Fragment { delta }) => {
                    self.conversation.apply_fragment(ticket, &delta)
                }
                Ok(StreamEvent::Done(terminal)) => self.conversation.apply_terminal(ticket, terminal),
                Err(err) => {
                    tracing::warn!(%ticket, error = %err, "Reply stream failed");
                    let kind = match err {
                        ClientError::Timeout => FailureKind::Timeout,
                        _ => FailureKind::Failed,
                    };
                    self.conversation.apply_failure(ticket, kind)
                }
            };

            match outcome {
                Outcome::Stale => {
                    tracing::debug!(%ticket, "Dropped event for superseded exchange");
                    continue;
                }
                Outcome::Completed { .. } => {
                    self.reader = None;
                    if let Err(err) = self.refresh_sessions().await {
                        tracing::warn!(error = %err, "Could not refresh session list");
                    }
                }
                Outcome::Failed(_) => self.reader = None,
                Outcome::Applied => {}
            }
            return Some(outcome);
        }
    }

    /// Pump until the pending exchange completes or fails.
    pub async fn finish_exchange(&mut self) -> Option<Outcome> {
        let mut last = None;
        while let Some(outcome) = self.pump().await {
            let done = !matches!(outcome, Outcome::Applied);
            last = Some(outcome);
            if done {
                break;
            }
        }
        last
    }

    /// Start an empty, session-less conversation.
    pub fn new_chat(&mut self) {
        self.cancel_reader();
        if let Some(ticket) = self.conversation.reset() {
            tracing::debug!(%ticket, "Abandoned exchange for new chat");
        }
    }

    /// Replace the transcript with a stored session.
    pub async fn open_session(&mut self, session_id: DbId) -> Result<(), ClientError> {
        let history = self.transport.history(session_id).await?;
        self.cancel_reader();
        self.conversation.load_session(&history);
        Ok(())
    }

    /// Delete a session. Deleting the open session resets the transcript.
    pub async fn delete_session(&mut self, session_id: DbId) -> Result<(), ClientError> {
        self.transport.delete_session(session_id).await?;

        if self.conversation.session_id() == Some(session_id) {
            self.cancel_reader();
            self.conversation.reset();
        }
        self.sessions.retain(|s| s.id != session_id);
        if let Err(err) = self.refresh_sessions().await {
            tracing::warn!(error = %err, "Could not refresh session list");
        }
        Ok(())
    }

    pub async fn refresh_sessions(&mut self) -> Result<&[SessionSummary], ClientError> {
        self.sessions = self.transport.list_sessions().await?;
        Ok(&self.sessions)
    }

    /// Quick-start prompts for the current context; never empty.
    pub async fn suggestions(&self) -> Vec<SuggestionGroup> {
        suggestions_or_fallback(self.transport.as_ref(), self.conversation.context()).await
    }

    fn spawn_reader(&mut self, ticket: Ticket, mut stream: EventStream) {
        self.cancel_reader();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    item = stream.next() => item,
                };
                match item {
                    Some(item) => {
                        let terminal = matches!(&item, Ok(event) if event.is_terminal());
                        let failed = item.is_err();
                        if tx.send((ticket, item)).await.is_err() || terminal || failed {
                            break;
                        }
                    }
                    None => {
                        let _ = tx.send((ticket, Err(ClientError::StreamClosed))).await;
                        break;
                    }
                }
            }
            tracing::trace!(%ticket, "Reader finished");
        });

        self.reader = Some(Reader { ticket, cancel });
    }

    fn cancel_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            tracing::debug!(ticket = %reader.ticket, "Cancelling reply reader");
            reader.cancel.cancel();
        }
    }
}

impl Drop for StreamConsumer {
    fn drop(&mut self) {
        self.cancel_reader();
    }
}
