//! The HTTP client against a real listening server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{build_test_app_with, token_for, FixedGenerator};
use futures::StreamExt;
use hrchat_client::model::OutgoingMessage;
use hrchat_client::{ChatTransport, HttpTransport, Outcome, Phase, StreamConsumer};
use hrchat_core::context::ChatContext;
use hrchat_core::message::MessageRole;
use hrchat_core::protocol::{StreamEvent, Terminal};

const FRAGMENTS: [&str; 3] = ["Você possui ", "12 dias ", "disponíveis."];
const FULL_TEXT: &str = "Você possui 12 dias disponíveis.";

/// Serve a fresh app on an ephemeral port and return its base URL.
async fn serve() -> String {
    let app = build_test_app_with(
        Arc::new(FixedGenerator::new(&FRAGMENTS, FULL_TEXT)),
        Duration::from_secs(5),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn transport_receives_fragments_in_order_then_terminal() {
    let base_url = serve().await;
    let transport = HttpTransport::new(base_url, token_for(1));

    let message = OutgoingMessage {
        content: "Qual meu saldo de férias?".into(),
        session_id: None,
        context: ChatContext::Vacation,
    };
    let events: Vec<StreamEvent> = transport
        .open_exchange(&message)
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    let (last, fragments) = events.split_last().unwrap();
    let deltas: Vec<_> = fragments
        .iter()
        .map(|e| match e {
            StreamEvent::Fragment { delta } => delta.as_str(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(deltas, FRAGMENTS);
    assert_matches!(last, StreamEvent::Done(Terminal::Completed(done)) if done.full_text == FULL_TEXT);
}

#[tokio::test]
async fn consumer_completes_exchange_and_reopens_it() {
    let base_url = serve().await;
    let transport = Arc::new(HttpTransport::new(base_url, token_for(1)));
    let mut consumer = StreamConsumer::new(transport, ChatContext::Vacation);

    consumer.send("Qual meu saldo de férias?").await.unwrap();
    let outcome = consumer.finish_exchange().await;

    let session_id = match outcome {
        Some(Outcome::Completed {
            session_id,
            new_session: true,
        }) => session_id,
        other => panic!("expected a completed new session, got {other:?}"),
    };
    assert_eq!(consumer.conversation().phase(), Phase::Completed);
    assert_eq!(consumer.conversation().session_id(), Some(session_id));
    assert_eq!(consumer.sessions().len(), 1);
    assert_eq!(consumer.sessions()[0].title, "Qual meu saldo de férias?");

    consumer.new_chat();
    assert!(consumer.conversation().entries().is_empty());

    consumer.open_session(session_id).await.unwrap();
    let entries = consumer.conversation().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, MessageRole::User);
    assert_eq!(entries[1].content, FULL_TEXT);
    assert!(entries.iter().all(|e| e.durable_id.is_some()));
}

#[tokio::test]
async fn deleting_open_session_resets_consumer() {
    let base_url = serve().await;
    let transport = Arc::new(HttpTransport::new(base_url, token_for(1)));
    let mut consumer = StreamConsumer::new(transport.clone(), ChatContext::General);

    consumer.send("oi").await.unwrap();
    let Some(Outcome::Completed { session_id, .. }) = consumer.finish_exchange().await else {
        panic!("exchange did not complete");
    };

    consumer.delete_session(session_id).await.unwrap();

    assert_eq!(consumer.conversation().session_id(), None);
    assert!(consumer.conversation().entries().is_empty());
    assert!(consumer.sessions().is_empty());

    let err = transport.delete_session(session_id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn suggestions_come_from_the_server() {
    let base_url = serve().await;
    let transport = Arc::new(HttpTransport::new(base_url, "not-a-token"));
    let consumer = StreamConsumer::new(transport, ChatContext::Payslip);

    let groups = consumer.suggestions().await;
    assert_eq!(
        groups,
        hrchat_core::suggestions::suggestions_for(ChatContext::Payslip)
    );
}
