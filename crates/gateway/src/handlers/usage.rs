//! Session usage reporting

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::middleware::session::SessionId;
use crate::AppState;
use reelsmith_common::models::ActionKind;

#[derive(Serialize)]
pub struct ActionUsage {
    pub kind: String,
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub session_id: String,
    pub month: String,
    pub unlimited: bool,
    pub actions: Vec<ActionUsage>,
    pub cost_usd: f64,
    pub upgrade_url: String,
}

/// Current month's usage for the caller's session
pub async fn get_usage(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Json<UsageResponse> {
    let record = state.usage.current(&session_id).await;

    let actions = [
        ActionKind::AgentCall,
        ActionKind::VideoGeneration,
        ActionKind::SpeechSynthesis,
        ActionKind::ImageGeneration,
    ]
    .into_iter()
    .map(|kind| {
        let used = record.count(kind);
        let limit = state.config.free_limit(kind);
        ActionUsage {
            kind: kind.as_str().to_string(),
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    })
    .collect();

    Json(UsageResponse {
        session_id,
        month: Utc::now().format("%Y-%m").to_string(),
        unlimited: record.has_payment_method,
        actions,
        cost_usd: record.cost_usd,
        upgrade_url: state.usage.upgrade_url().to_string(),
    })
}
