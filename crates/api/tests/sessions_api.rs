//! HTTP-level tests for the `/api/v1/chat/sessions` endpoints.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_with, delete, exchange, get, token_for,
    FailingGenerator, FixedGenerator,
};
use hrchat_core::context::ChatContext;
use hrchat_core::protocol::{StreamEvent, Terminal, ERROR_GENERATION_FAILED};
use hrchat_core::types::DbId;
use hrchat_db::models::chat_session::NewExchange;
use hrchat_db::store::SessionStore;
use serde_json::json;

async fn completed_session(app: &common::TestApp, token: &str, content: &str) -> DbId {
    let events = exchange(app, token, json!({ "content": content })).await;
    match events.last() {
        Some(StreamEvent::Done(Terminal::Completed(done))) => done.session_id,
        other => panic!("exchange did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn list_is_empty_for_new_user() {
    let app = build_test_app();
    let response = get(app.router.clone(), "/api/v1/chat/sessions", &token_for(1)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_requires_auth() {
    let app = build_test_app();
    let response = common::get_public(app.router.clone(), "/api/v1/chat/sessions").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_shows_title_from_first_message_most_recent_first() {
    let app = build_test_app();
    let token = token_for(1);

    let older = completed_session(&app, &token, "Qual meu saldo de férias?").await;
    let newer = completed_session(&app, &token, "Quando cai o salário?").await;

    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &token).await).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], newer);
    assert_eq!(data[1]["id"], older);
    assert_eq!(data[1]["title"], "Qual meu saldo de férias?");
    assert!(data[0].get("created_at").is_some());
}

#[tokio::test]
async fn long_first_message_is_truncated_into_title() {
    let app = build_test_app();
    let token = token_for(1);
    let content = "Gostaria de entender como funciona o cálculo das férias proporcionais";

    completed_session(&app, &token, content).await;

    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &token).await).await;
    let title = json["data"][0]["title"].as_str().unwrap();
    assert!(title.ends_with("..."));
    assert!(title.chars().count() <= 53);
}

#[tokio::test]
async fn users_only_see_their_own_sessions() {
    let app = build_test_app();
    let alice = token_for(1);
    let bob = token_for(2);

    let session_id = completed_session(&app, &alice, "oi").await;

    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &bob).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let uri = format!("/api/v1/chat/sessions/{session_id}");
    assert_eq!(
        get(app.router.clone(), &uri, &bob).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        delete(app.router.clone(), &uri, &bob).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(app.router.clone(), &uri, &alice).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn history_returns_session_and_ordered_messages() {
    let generator = FixedGenerator::new(&["Seu saldo ", "é 12 dias."], "Seu saldo é 12 dias.");
    let app = build_test_app_with(Arc::new(generator), Duration::from_secs(5));
    let token = token_for(1);

    let session_id = completed_session(&app, &token, "  Qual meu saldo?  ").await;

    let uri = format!("/api/v1/chat/sessions/{session_id}");
    let json = body_json(get(app.router.clone(), &uri, &token).await).await;

    assert_eq!(json["data"]["session"]["id"], session_id);
    let messages = json["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "Qual meu saldo?");
    assert_eq!(messages[0]["sequence"], 1);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Seu saldo é 12 dias.");
    assert_eq!(messages[1]["sequence"], 2);
}

#[tokio::test]
async fn delete_removes_session_and_is_not_idempotent() {
    let app = build_test_app();
    let token = token_for(1);
    let session_id = completed_session(&app, &token, "oi").await;
    let uri = format!("/api/v1/chat/sessions/{session_id}");

    let response = delete(app.router.clone(), &uri, &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &token).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
    assert_eq!(
        get(app.router.clone(), &uri, &token).await.status(),
        StatusCode::NOT_FOUND
    );

    let again = delete(app.router.clone(), &uri, &token).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: atomic persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_generation_creates_no_session() {
    let app = build_test_app_with(Arc::new(FailingGenerator), Duration::from_secs(5));
    let token = token_for(1);

    let events = exchange(&app, &token, json!({ "content": "oi" })).await;

    assert_eq!(
        events.last(),
        Some(&StreamEvent::Done(Terminal::failed(ERROR_GENERATION_FAILED)))
    );
    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &token).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failed_follow_up_leaves_history_paired() {
    let app = build_test_app_with(Arc::new(FailingGenerator), Duration::from_secs(5));
    let token = token_for(1);
    let seeded = app
        .store
        .commit_exchange(NewExchange {
            owner_id: 1,
            session_id: None,
            title: "Antiga".into(),
            context: ChatContext::General,
            user_content: "pergunta".into(),
            assistant_content: "resposta".into(),
        })
        .await
        .unwrap()
        .unwrap();

    let events = exchange(
        &app,
        &token,
        json!({ "content": "outra", "session_id": seeded.session.id }),
    )
    .await;
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Done(Terminal::Failed { .. }))
    ));

    let uri = format!("/api/v1/chat/sessions/{}", seeded.session.id);
    let json = body_json(get(app.router.clone(), &uri, &token).await).await;
    let messages = json["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.last().unwrap()["role"], "assistant");
}

#[tokio::test]
async fn blank_final_reply_is_a_failure() {
    let generator = FixedGenerator::new(&["  "], "   ");
    let app = build_test_app_with(Arc::new(generator), Duration::from_secs(5));
    let token = token_for(1);

    let events = exchange(&app, &token, json!({ "content": "oi" })).await;

    assert_eq!(
        events.last(),
        Some(&StreamEvent::Done(Terminal::failed(ERROR_GENERATION_FAILED)))
    );
    let json = body_json(get(app.router.clone(), "/api/v1/chat/sessions", &token).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}
