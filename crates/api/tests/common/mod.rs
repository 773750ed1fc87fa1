#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use eventsource_stream::Eventsource;
use http_body_util::BodyExt;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use hrchat_api::auth::jwt::{generate_access_token, JwtConfig};
use hrchat_api::config::{GenerationConfig, GeneratorBackend, ServerConfig};
use hrchat_api::engine::{
    GenerationError, GenerationEvent, GenerationRequest, GenerationStream, ReplyGenerator,
    ScriptedGenerator,
};
use hrchat_api::gateway::StreamingGateway;
use hrchat_api::router::build_app_router;
use hrchat_api::state::AppState;
use hrchat_core::protocol::StreamEvent;
use hrchat_core::types::DbId;
use hrchat_db::store::{MemorySessionStore, SessionStore};

pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: None,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        generation: GenerationConfig {
            backend: GeneratorBackend::Scripted,
            timeout_secs: 5,
            history_window: 20,
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            model: "test".to_string(),
            scripted_delay_ms: 0,
        },
    }
}

/// A bearer token the test app accepts for `user_id`.
pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config().jwt).expect("token")
}

/// Router plus handles on the pieces tests inspect directly.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
    pub gateway: Arc<StreamingGateway>,
}

/// Full application with the in-memory store and the given generator.
pub fn build_test_app_with(generator: Arc<dyn ReplyGenerator>, timeout: Duration) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemorySessionStore::new());
    let gateway = Arc::new(StreamingGateway::new(
        store.clone() as Arc<dyn SessionStore>,
        generator,
        timeout,
        config.generation.history_window,
    ));

    let state = AppState {
        store: store.clone(),
        gateway: gateway.clone(),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        gateway,
    }
}

/// Full application with the scripted generator, exactly as the binary wires it.
pub fn build_test_app() -> TestApp {
    build_test_app_with(
        Arc::new(ScriptedGenerator::new(Duration::ZERO)),
        Duration::from_secs(5),
    )
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_public(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut request = Request::post(uri).header("content-type", "application/json");
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    let request = request.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a raw body, for requests that are not valid JSON.
pub async fn post_raw(app: Router, uri: &str, token: &str, body: &'static str) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::delete(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read a whole SSE response and decode it into stream events.
pub async fn stream_events(response: Response<Body>) -> Vec<StreamEvent> {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    decode_sse(bytes.to_vec()).await
}

pub async fn decode_sse(bytes: Vec<u8>) -> Vec<StreamEvent> {
    // Scoped: `Body` is a `Stream` too, so a module-level import would make
    // `BodyExt::collect` ambiguous.
    use futures::StreamExt;

    let frames: Vec<_> = futures::stream::iter([Ok::<_, std::convert::Infallible>(bytes)])
        .eventsource()
        .collect()
        .await;
    frames
        .into_iter()
        .filter_map(|frame| {
            let frame = frame.unwrap();
            StreamEvent::from_sse(&frame.event, &frame.data).unwrap()
        })
        .collect()
}

/// Open an exchange through the HTTP layer and collect all of its events.
pub async fn exchange(
    app: &TestApp,
    token: &str,
    body: serde_json::Value,
) -> Vec<StreamEvent> {
    let response = post_json(app.router.clone(), "/api/v1/chat/stream", Some(token), body).await;
    stream_events(response).await
}

// ---------------------------------------------------------------------------
// Test generators
// ---------------------------------------------------------------------------

/// Emits fixed fragments and a fixed final text.
pub struct FixedGenerator {
    pub fragments: Vec<String>,
    pub full_text: String,
}

impl FixedGenerator {
    pub fn new(fragments: &[&str], full_text: &str) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            full_text: full_text.to_string(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for FixedGenerator {
    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let mut items: Vec<Result<GenerationEvent, GenerationError>> = self
            .fragments
            .iter()
            .cloned()
            .map(|f| Ok(GenerationEvent::Delta(f)))
            .collect();
        items.push(Ok(GenerationEvent::Completed {
            full_text: self.full_text.clone(),
        }));
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Emits one fragment and then fails.
pub struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let items: Vec<Result<GenerationEvent, GenerationError>> = vec![
            Ok(GenerationEvent::Delta("Um momento".into())),
            Err(GenerationError::Upstream {
                status: 503,
                message: "model overloaded".into(),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Emits one fragment, then waits for [`GatedGenerator::release`] before
/// completing. Never released means it never completes. Releases accumulate,
/// so calling `release` before the generation reaches the gate is fine.
pub struct GatedGenerator {
    gate: Arc<Semaphore>,
}

impl GatedGenerator {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let one waiting (or the next) generation finish.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ReplyGenerator for GatedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let gate = Arc::clone(&self.gate);
        let stream = async_stream::stream! {
            yield Ok::<_, GenerationError>(GenerationEvent::Delta("Aguarde ".into()));
            gate.acquire().await.unwrap().forget();
            yield Ok::<_, GenerationError>(GenerationEvent::Completed {
                full_text: format!("Resposta para: {}", request.content),
            });
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Poll until `condition` holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
