//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub ffmpeg: CheckResult,
    pub vendors: VendorChecks,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which vendors have API keys configured. An unconfigured vendor only
/// degrades its own routes, so this never flips readiness.
#[derive(Serialize)]
pub struct VendorChecks {
    pub openai: bool,
    pub xai: bool,
    pub luma: bool,
    pub elevenlabs: bool,
    pub stripe: bool,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: reelsmith_common::VERSION.to_string(),
    })
}

/// Readiness probe - checks the ffmpeg binary and reports vendor state
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let ffmpeg = if state.frames.probe().await {
        CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        }
    } else {
        CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(format!(
                "{} is not invocable",
                state.config.pipeline.ffmpeg_bin
            )),
        }
    };

    let all_healthy = ffmpeg.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            ffmpeg,
            vendors: VendorChecks {
                openai: state.vendors.images.is_some(),
                xai: state.vendors.chat.is_some(),
                luma: state.vendors.video.is_some(),
                elevenlabs: state.vendors.speech.is_some(),
                stripe: state.config.stripe.webhook_secret.is_some(),
            },
        },
    })
}
