//! Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
//!
//! The request is sent with `stream: true`; the response is an event stream
//! whose messages carry JSON chunks (`choices[0].delta.content`) and end with
//! a literal `[DONE]`.

use async_trait::async_trait;
use futures::StreamExt;
use hrchat_core::message::MessageRole;
use reqwest::{header, Client};
use reqwest_eventsource::{retry, Event, EventSource};
use serde_json::{json, Value};

use super::{GenerationError, GenerationEvent, GenerationRequest, GenerationStream, ReplyGenerator};

/// Streaming chat-completions client.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(json!({ "role": "system", "content": request.instructions() }));
        for turn in &request.history {
            let role = match turn.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": turn.content }));
        }
        messages.push(json!({ "role": "user", "content": request.content }));

        json!({
            "model": self.model,
            "stream": true,
            "messages": messages,
        })
    }
}

/// One decoded message of the upstream stream.
#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    Delta(String),
    Done,
    Skip,
}

/// Decode the data of a single upstream message.
fn parse_chunk(data: &str) -> Result<Chunk, GenerationError> {
    if data == "[DONE]" {
        return Ok(Chunk::Done);
    }

    let value: Value =
        serde_json::from_str(data).map_err(|e| GenerationError::Decode(e.to_string()))?;
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return Err(GenerationError::Upstream {
            status: 200,
            message: message.to_string(),
        });
    }
    match value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => Ok(Chunk::Delta(content.to_string())),
        _ => Ok(Chunk::Skip),
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request_body(&request));

        let mut source =
            EventSource::new(builder).map_err(|e| GenerationError::Transport(e.to_string()))?;
        // A retried request would start a second, unrelated completion.
        source.set_retry_policy(Box::new(retry::Never));

        let first = match source.next().await {
            Some(Ok(first)) => first,
            Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".into());
                tracing::warn!(status = status.as_u16(), "Generator upstream rejected request");
                return Err(GenerationError::Upstream {
                    status: status.as_u16(),
                    message,
                });
            }
            Some(Err(err)) => return Err(err.into()),
            None => return Err(GenerationError::Incomplete),
        };

        let mut events = Box::pin(futures::stream::iter([Ok(first)]).chain(source));
        let stream = async_stream::stream! {
            let mut full_text = String::new();

            while let Some(event) = events.next().await {
                let message = match event {
                    Ok(Event::Open) => continue,
                    Ok(Event::Message(message)) => message,
                    Err(err) => {
                        yield Err(GenerationError::from(err));
                        return;
                    }
                };
                match parse_chunk(&message.data) {
                    Ok(Chunk::Delta(delta)) => {
                        full_text.push_str(&delta);
                        yield Ok(GenerationEvent::Delta(delta));
                    }
                    Ok(Chunk::Done) => {
                        yield Ok(GenerationEvent::Completed {
                            full_text: full_text.trim().to_string(),
                        });
                        return;
                    }
                    Ok(Chunk::Skip) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }

            yield Err(GenerationError::Incomplete);
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;
    use axum::response::sse::{Event as SseEvent, Sse};
    use axum::routing::post;
    use axum::Router;
    use hrchat_core::context::ChatContext;

    use crate::engine::HistoryTurn;

    fn vacation_request() -> GenerationRequest {
        GenerationRequest {
            context: ChatContext::Vacation,
            history: Vec::new(),
            content: "Qual meu saldo de férias?".into(),
        }
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn upstream(chunks: &'static [&'static str]) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move || async move {
                let events = chunks
                    .iter()
                    .map(|data| Ok::<_, Infallible>(SseEvent::default().data(*data)));
                Sse::new(futures::stream::iter(events))
            }),
        )
    }

    #[test]
    fn parses_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Olá"}}]}"#;
        assert_eq!(parse_chunk(data).unwrap(), Chunk::Delta("Olá".into()));
    }

    #[test]
    fn keeps_leading_space_inside_content() {
        let data = r#"{"choices":[{"delta":{"content":" dias"}}]}"#;
        assert_eq!(parse_chunk(data).unwrap(), Chunk::Delta(" dias".into()));
    }

    #[test]
    fn recognizes_done_marker() {
        assert_eq!(parse_chunk("[DONE]").unwrap(), Chunk::Done);
    }

    #[test]
    fn skips_role_only_chunks() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_chunk(role_only).unwrap(), Chunk::Skip);
    }

    #[test]
    fn surfaces_inline_errors() {
        let data = r#"{"error":{"message":"rate limited"}}"#;
        assert_matches!(
            parse_chunk(data),
            Err(GenerationError::Upstream { message, .. }) if message == "rate limited"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_matches!(parse_chunk("{not json"), Err(GenerationError::Decode(_)));
    }

    #[test]
    fn request_body_orders_system_history_then_user() {
        let generator = OpenAiGenerator::new("http://x".into(), "k".into(), "m".into());
        let request = GenerationRequest {
            context: ChatContext::Payslip,
            history: vec![
                HistoryTurn {
                    role: MessageRole::User,
                    content: "oi".into(),
                },
                HistoryTurn {
                    role: MessageRole::Assistant,
                    content: "olá".into(),
                },
            ],
            content: "e o desconto?".into(),
        };

        let body = generator.request_body(&request);
        let roles: Vec<_> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][3]["content"], "e o desconto?");
    }

    #[tokio::test]
    async fn streams_deltas_then_trimmed_completion() {
        let base_url = serve(upstream(&[
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":"Você possui "}}]}"#,
            r#"{"choices":[{"delta":{"content":"12 dias. "}}]}"#,
            "[DONE]",
        ]))
        .await;
        let generator = OpenAiGenerator::new(base_url, "k".into(), "m".into());

        let events: Vec<_> = generator
            .generate(vacation_request())
            .await
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                GenerationEvent::Delta("Você possui ".into()),
                GenerationEvent::Delta("12 dias. ".into()),
                GenerationEvent::Completed {
                    full_text: "Você possui 12 dias.".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn stream_without_done_marker_is_incomplete() {
        let base_url = serve(upstream(&[r#"{"choices":[{"delta":{"content":"meia"}}]}"#])).await;
        let generator = OpenAiGenerator::new(base_url, "k".into(), "m".into());

        let mut stream = generator.generate(vacation_request()).await.unwrap();

        assert_matches!(stream.next().await, Some(Ok(GenerationEvent::Delta(_))));
        assert_matches!(stream.next().await, Some(Err(GenerationError::Incomplete)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn rejected_request_is_an_upstream_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let generator = OpenAiGenerator::new(serve(router).await, "k".into(), "m".into());

        let err = generator
            .generate(vacation_request())
            .await
            .err()
            .expect("request should be rejected");

        assert_matches!(
            err,
            GenerationError::Upstream { status: 429, message } if message == "slow down"
        );
    }
}
