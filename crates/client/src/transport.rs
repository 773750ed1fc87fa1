//! How the consumer reaches the server.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use hrchat_core::context::ChatContext;
use hrchat_core::protocol::StreamEvent;
use hrchat_core::suggestions::{fallback_suggestions, SuggestionGroup};
use hrchat_core::types::DbId;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use reqwest_eventsource::{retry, Event, EventSource};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::model::{DataEnvelope, ErrorBody, OutgoingMessage, SessionHistory, SessionSummary};

/// Upper bound on fetching suggestions before the built-in set is shown.
pub const SUGGESTIONS_TIMEOUT: Duration = Duration::from_secs(3);

/// Default limit for plain request/response calls and for the server to
/// accept an exchange. Reply streams themselves are unbounded here; the
/// consumer's idle timeout covers them.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decoded events of one exchange, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Server operations used by [`crate::consumer::StreamConsumer`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start an exchange. Errors here (validation, conflict, not found) happen
    /// before any event.
    async fn open_exchange(&self, message: &OutgoingMessage) -> Result<EventStream, ClientError>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError>;

    async fn history(&self, session_id: DbId) -> Result<SessionHistory, ClientError>;

    async fn delete_session(&self, session_id: DbId) -> Result<(), ClientError>;

    async fn suggestions(&self, context: ChatContext) -> Result<Vec<SuggestionGroup>, ClientError>;
}

/// Suggestions for `context`, or the built-in set when the call fails,
/// returns nothing, or takes longer than [`SUGGESTIONS_TIMEOUT`].
pub async fn suggestions_or_fallback(
    transport: &dyn ChatTransport,
    context: ChatContext,
) -> Vec<SuggestionGroup> {
    suggestions_within(transport, context, SUGGESTIONS_TIMEOUT).await
}

/// [`suggestions_or_fallback`] with an explicit time limit.
pub async fn suggestions_within(
    transport: &dyn ChatTransport,
    context: ChatContext,
    limit: Duration,
) -> Vec<SuggestionGroup> {
    match tokio::time::timeout(limit, transport.suggestions(context)).await {
        Ok(Ok(groups)) if !groups.is_empty() => groups,
        Ok(Ok(_)) => fallback_suggestions(),
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "Using fallback suggestions");
            fallback_suggestions()
        }
        Err(_) => {
            tracing::debug!(
                limit_ms = limit.as_millis() as u64,
                "Suggestions timed out, using fallback"
            );
            fallback_suggestions()
        }
    }
}

/// Map server-sent events to chat events. Stops after the terminal or the
/// first error; unknown event names are skipped.
pub fn decode_events<S>(events: S) -> EventStream
where
    S: Stream<Item = Result<Event, reqwest_eventsource::Error>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(events);

        while let Some(item) = events.next().await {
            let message = match item {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(err) => {
                    yield Err(ClientError::from(err));
                    return;
                }
            };
            match StreamEvent::from_sse(&message.event, &message.data) {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    yield Ok(event);
                    if terminal {
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    yield Err(ClientError::from(err));
                    return;
                }
            }
        }
    })
}

/// [`ChatTransport`] over HTTP with a bearer token.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Falling back to default HTTP client");
                Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// A bounded, authenticated request.
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::AUTHORIZATION, self.bearer())
            .timeout(self.request_timeout)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(self.client.get(self.url(path))).send().await?;
        let envelope: DataEnvelope<T> = check(response).await?.json().await?;
        Ok(envelope.data)
    }
}

/// Turn non-success responses into [`ClientError::Http`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(http_error(status, response).await)
}

/// Read the `{error, code}` body of a rejected request.
async fn http_error(status: StatusCode, response: Response) -> ClientError {
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.code, body.error),
        Err(_) => ("HTTP_ERROR".to_string(), text),
    };
    ClientError::Http {
        status: status.as_u16(),
        code,
        message,
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_exchange(&self, message: &OutgoingMessage) -> Result<EventStream, ClientError> {
        let request = self
            .client
            .post(self.url("/chat/stream"))
            .header(header::AUTHORIZATION, self.bearer())
            .json(message);

        let mut source =
            EventSource::new(request).map_err(|err| ClientError::Transport(err.to_string()))?;
        // Reconnecting would post the message a second time.
        source.set_retry_policy(Box::new(retry::Never));

        let opened = tokio::time::timeout(self.request_timeout, source.next())
            .await
            .map_err(|_| ClientError::Timeout)?;
        match opened {
            Some(Ok(first)) => Ok(decode_events(
                futures::stream::iter([Ok(first)]).chain(source),
            )),
            Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                Err(http_error(status, response).await)
            }
            Some(Err(err)) => Err(err.into()),
            None => Err(ClientError::StreamClosed),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        self.get_data("/chat/sessions").await
    }

    async fn history(&self, session_id: DbId) -> Result<SessionHistory, ClientError> {
        self.get_data(&format!("/chat/sessions/{session_id}")).await
    }

    async fn delete_session(&self, session_id: DbId) -> Result<(), ClientError> {
        let url = self.url(&format!("/chat/sessions/{session_id}"));
        let response = self.request(self.client.delete(url)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn suggestions(&self, context: ChatContext) -> Result<Vec<SuggestionGroup>, ClientError> {
        let response = self
            .client
            .get(self.url("/chat/suggestions"))
            .query(&[("context", context.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await?;
        let envelope: DataEnvelope<Vec<SuggestionGroup>> = check(response).await?.json().await?;
        Ok(envelope.data)
    }
}
