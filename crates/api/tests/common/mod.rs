#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use jsonwebtoken::{encode, EncodingKey, Header};
use neurovid_api::auth::jwt::{Claims, JwtConfig};
use neurovid_api::config::ServerConfig;
use neurovid_api::middleware::auth::TEST_USER_HEADER;
use neurovid_api::routes;
use neurovid_api::state::AppState;
use neurovid_db::models::survey::CreateSurvey;
use neurovid_pipeline::memory::{MemoryGenerationStore, MemoryJobQueue, MemorySurveyStore};
use neurovid_pipeline::SurveyStore;

pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Build a test `ServerConfig`: test header enabled, quota of 3.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![TEST_ORIGIN.to_string()],
        request_timeout_secs: 30,
        allow_test_header: true,
        generation_quota: 3,
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
        },
    }
}

/// The router plus handles on its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    pub generations: Arc<MemoryGenerationStore>,
    pub surveys: Arc<MemorySurveyStore>,
    pub queue: Arc<MemoryJobQueue>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Record a completed style survey for `principal_id`.
    pub async fn complete_survey(&self, principal_id: &str, quadrant: &str) {
        self.surveys
            .create(CreateSurvey {
                owner_id: principal_id.to_string(),
                left_score: 50,
                right_score: 50,
                dominant_quadrant: quadrant.to_string(),
            })
            .await
            .unwrap();
    }

    /// HS256 token for `principal_id`, signed like the identity provider's.
    pub fn token_for(&self, principal_id: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: principal_id.to_string(),
            exp: now + 900,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .unwrap()
    }

    /// Let detached enqueue tasks run until `count` jobs exist.
    pub async fn wait_for_jobs(&self, count: usize) {
        for _ in 0..1_000 {
            if self.queue.jobs().await.len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} queued jobs");
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

/// Build the full application router with all middleware layers over
/// in-memory stores.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack.
pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let generations = Arc::new(MemoryGenerationStore::new());
    let surveys = Arc::new(MemorySurveyStore::new());
    let queue = Arc::new(MemoryJobQueue::new());

    let state = AppState::new(
        config.clone(),
        None,
        generations.clone(),
        surveys.clone(),
        queue.clone(),
    );

    let cors = CorsLayer::new()
        .allow_origin([TEST_ORIGIN.parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(TEST_USER_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        config,
        generations,
        surveys,
        queue,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Unauthenticated GET.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET as `principal_id` via the test header.
pub async fn get_as(app: Router, uri: &str, principal_id: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(TEST_USER_HEADER, principal_id)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET with a bearer token.
pub async fn get_with_token(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body as `principal_id` via the test header.
pub async fn post_json_as(
    app: Router,
    uri: &str,
    principal_id: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(TEST_USER_HEADER, principal_id)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
