//! Speech synthesis handler

use axum::{extract::State, http::header, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use validator::Validate;

use crate::handlers::{require_quota, validated};
use crate::middleware::session::SessionId;
use crate::AppState;
use reelsmith_common::{errors::Result, models::ActionKind};

#[derive(Debug, Deserialize, Validate)]
pub struct SpeechRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,

    /// Vendor voice id; defaults from config
    pub voice: Option<String>,
}

/// Synthesize speech, returning raw audio/mpeg bytes
pub async fn synthesize_speech(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(request): Json<SpeechRequest>,
) -> Result<impl IntoResponse> {
    validated(&request)?;
    require_quota(&state, &session_id, ActionKind::SpeechSynthesis).await?;

    let speech = state.vendors.speech()?.clone();
    let voice = request
        .voice
        .unwrap_or_else(|| state.config.vendors.elevenlabs.default_voice.clone());
    let audio = speech.synthesize(&request.text, &voice).await?;

    state
        .usage
        .track(&session_id, ActionKind::SpeechSynthesis, 1, 0.0)
        .await;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}
