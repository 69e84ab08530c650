//! Reelsmith API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Anonymous session attribution
//! - Rate limiting and per-session usage quotas
//! - Request routing
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use reelsmith_common::{
    agents::AgentStore,
    config::AppConfig,
    feeds::FeedAggregator,
    metrics,
    store::{CustomerStore, JobStore, UsageStore},
    vendors::VendorClients,
};
use reelsmith_pipeline::{FfmpegFrameExtractor, FrameExtractor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub usage: UsageStore,
    pub jobs: JobStore,
    pub customers: CustomerStore,
    pub agents: AgentStore,
    pub vendors: VendorClients,
    pub feeds: FeedAggregator,
    pub frames: Arc<dyn FrameExtractor>,
}

impl AppState {
    fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            usage: UsageStore::new(config.usage.clone()),
            jobs: JobStore::new(Duration::from_secs(config.pipeline.job_ttl_secs)),
            customers: CustomerStore::new(),
            agents: AgentStore::new(&config.agents.dir),
            vendors: VendorClients::from_config(&config.vendors, &config.pipeline),
            feeds: FeedAggregator::new(config.feeds.clone()),
            frames: Arc::new(FfmpegFrameExtractor::new(
                config.pipeline.ffmpeg_bin.clone(),
                config.pipeline.work_dir.clone(),
            )),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?);

    init_tracing(&config);

    info!("Starting Reelsmith API Gateway v{}", reelsmith_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }

    // Create app state
    let state = AppState::from_config(config.clone());

    // Background job sweeper, stopped with the server
    let shutdown = CancellationToken::new();
    state.jobs.spawn_sweeper(
        Duration::from_secs(config.pipeline.sweep_interval_secs),
        shutdown.clone(),
    );

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber from the observability config
fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Agent endpoints
        .route(
            "/agents",
            post(handlers::agents::create_agent).get(handlers::agents::list_agents),
        )
        .route("/agents/run", post(handlers::agents::run_agent))
        .route(
            "/agents/{id}",
            get(handlers::agents::get_agent)
                .put(handlers::agents::update_agent)
                .delete(handlers::agents::delete_agent),
        )
        // Video endpoints
        .route("/video/generate", post(handlers::video::generate_video))
        .route("/video/jobs/{id}", get(handlers::video::get_video_job))
        .route(
            "/video/jobs/{id}/cancel",
            post(handlers::video::cancel_video_job),
        )
        // Feed endpoint
        .route("/feeds", get(handlers::feeds::list_feeds))
        // Usage endpoint
        .route("/usage", get(handlers::usage::get_usage))
        // Speech endpoint
        .route("/speech", post(handlers::speech::synthesize_speech))
        // Billing endpoint
        .route("/billing/webhook", post(handlers::billing::stripe_webhook));

    let mut router = Router::new()
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(
            limit,
            state.config.rate_limit.burst,
        );
        router = router.layer(axum::middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter, limit).await
            }
        }));
    }

    router.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use reelsmith_common::billing::sign_payload;
    use reelsmith_common::vendors::{
        MockChatModel, MockImageGenerator, MockSpeechSynthesizer, MockVideoSynthesizer,
    };
    use reelsmith_pipeline::MockFrameExtractor;
    use tower::util::ServiceExt;
    use uuid::Uuid;

    const WEBHOOK_SECRET: &str = "whsec_gateway_test";

    fn test_state() -> AppState {
        let mut config = AppConfig::default();
        config.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        config.agents.dir = std::env::temp_dir()
            .join(format!("reelsmith-gw-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();

        let mut state = AppState::from_config(Arc::new(config));
        state.vendors = VendorClients {
            images: Some(Arc::new(MockImageGenerator::default())),
            chat: Some(Arc::new(MockChatModel::default())),
            video: Some(Arc::new(MockVideoSynthesizer::default())),
            speech: Some(Arc::new(MockSpeechSynthesizer::default())),
        };
        state.frames = Arc::new(MockFrameExtractor::default());
        state
    }

    fn json_request(uri: &str, session: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("anon_session={}", session))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("healthy"));
    }

    #[tokio::test]
    async fn test_session_cookie_minted_once() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(Request::get("/v1/usage").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("anon_session="));
        assert!(set_cookie.contains("HttpOnly"));

        // A request that already carries the cookie gets no new one
        let response = app
            .oneshot(
                Request::get("/v1/usage")
                    .header(header::COOKIE, "anon_session=existing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_string(response).await.contains("existing"));
    }

    #[tokio::test]
    async fn test_generate_video_rejects_bad_input() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/video/generate",
                "s1",
                serde_json::json!({ "prompt": "   " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/video/generate",
                "s1",
                serde_json::json!({ "prompt": "a storm", "duration": 500 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "/v1/video/generate",
                "s1",
                serde_json::json!({ "prompt": "a storm", "segment_length": "7s" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_video_quota_exhaustion_returns_429() {
        let app = create_router(test_state());

        // Free tier allows 2 video generations per month
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(json_request(
                    "/v1/video/generate",
                    "quota-sess",
                    serde_json::json!({ "prompt": "a lighthouse", "duration": 5 }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("\"success\":true"));
        }

        let response = app
            .oneshot(json_request(
                "/v1/video/generate",
                "quota-sess",
                serde_json::json!({ "prompt": "a lighthouse", "duration": 5 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_string(response).await;
        assert!(body.contains("upgrade_url"), "got: {}", body);
    }

    #[tokio::test]
    async fn test_generated_job_is_pollable() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/video/generate",
                "s1",
                serde_json::json!({ "prompt": "dunes at dusk", "duration": 10 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        let job_id = parsed["job_id"].as_str().unwrap();

        let response = app
            .oneshot(
                Request::get(format!("/v1/video/jobs/{}", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("completed"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(
                Request::get("/v1/video/jobs/vj_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::post("/v1/video/jobs/vj_missing/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_agent_crud_and_streamed_run() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/agents",
                "s1",
                serde_json::json!({
                    "name": "copywriter",
                    "system_prompt": "You write short video captions."
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        let agent_id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/v1/agents/{}", agent_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request(
                "/v1/agents/run",
                "s1",
                serde_json::json!({ "agent_id": agent_id, "user_message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Hello"), "got: {}", body);
        assert!(body.contains("[DONE]"), "got: {}", body);
    }

    #[tokio::test]
    async fn test_run_unknown_agent_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(json_request(
                "/v1/agents/run",
                "s1",
                serde_json::json!({ "agent_id": Uuid::new_v4(), "user_message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_speech_returns_audio() {
        let app = create_router(test_state());
        let response = app
            .oneshot(json_request(
                "/v1/speech",
                "s1",
                serde_json::json!({ "text": "hello there" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("audio/mpeg")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_vendor_is_503() {
        let mut state = test_state();
        state.vendors = VendorClients::default();
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                "/v1/speech",
                "s1",
                serde_json::json!({ "text": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_webhook_signature_gate() {
        let app = create_router(test_state());
        let payload = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "customer": "cus_1", "client_reference_id": "paid-sess" } }
        })
        .to_string();

        // Unsigned request is rejected before parsing
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/billing/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("stripe-signature", "t=0,v1=deadbeef")
                    .body(Body::from(payload.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Properly signed request upgrades the referenced session
        let signature =
            sign_payload(payload.as_bytes(), WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/billing/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("stripe-signature", signature)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/v1/usage")
                    .header(header::COOKIE, "anon_session=paid-sess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_string(response).await.contains("\"unlimited\":true"));
    }

    #[tokio::test]
    async fn test_webhook_resolves_session_from_linked_customer() {
        let state = test_state();
        state.customers.link("cus_77", "linked-sess").await;
        let app = create_router(state);

        // No client_reference_id; the customer mapping is the only route
        // back to the session.
        let payload = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "customer": "cus_77" } }
        })
        .to_string();
        let signature =
            sign_payload(payload.as_bytes(), WEBHOOK_SECRET, chrono::Utc::now().timestamp());
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/billing/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("stripe-signature", signature)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/v1/usage")
                    .header(header::COOKIE, "anon_session=linked-sess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_string(response).await.contains("\"unlimited\":true"));
    }
}
