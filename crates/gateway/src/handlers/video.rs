//! Video generation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::handlers::require_quota;
use crate::middleware::session::SessionId;
use crate::AppState;
use reelsmith_common::{
    errors::{AppError, Result},
    models::{ActionKind, JobStatus, SegmentLength, VideoJob, VideoSegment},
};
use reelsmith_pipeline::{Orchestrator, PipelineRequest};

/// Request to generate a video
#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    pub prompt: String,

    /// Target duration in seconds; defaults from config
    pub duration: Option<u32>,

    #[serde(default)]
    pub style: Option<String>,

    /// "5s" or "9s"
    pub segment_length: Option<String>,
}

/// Final pipeline outcome; completed segments survive a failure
#[derive(Serialize)]
pub struct GenerateVideoResponse {
    pub success: bool,
    pub job_id: String,
    pub segments: Vec<VideoSegment>,
    pub total_duration: u32,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CancelJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Generate a video. Runs the pipeline inline; the job record is
/// poll-able at `/v1/video/jobs/{id}` while this request is in flight.
pub async fn generate_video(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(request): Json<GenerateVideoRequest>,
) -> Result<Json<GenerateVideoResponse>> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::MissingField {
            field: "prompt".to_string(),
        });
    }

    let duration = request
        .duration
        .unwrap_or(state.config.pipeline.default_duration_secs);
    if !(1..=120).contains(&duration) {
        return Err(AppError::Validation {
            message: "duration must be between 1 and 120 seconds".to_string(),
            field: Some("duration".to_string()),
        });
    }

    let segment_length = match request.segment_length.as_deref() {
        None => SegmentLength::FiveSeconds,
        Some(raw) => SegmentLength::parse(raw).ok_or_else(|| AppError::InvalidFormat {
            message: format!("Unknown segment length {:?}; expected \"5s\" or \"9s\"", raw),
        })?,
    };

    require_quota(&state, &session_id, ActionKind::VideoGeneration).await?;

    // All three pipeline vendors must be configured before a job exists
    let images = state.vendors.images()?.clone();
    let chat = state.vendors.chat()?.clone();
    let video = state.vendors.video()?.clone();

    let orchestrator = Orchestrator::new(
        images,
        chat,
        video,
        state.frames.clone(),
        state.jobs.clone(),
        state.config.pipeline.clone(),
    );

    let segments_total = Orchestrator::segments_for(duration, segment_length);
    state
        .usage
        .track(
            &session_id,
            ActionKind::VideoGeneration,
            1,
            orchestrator.estimate_cost(segments_total),
        )
        .await;

    let result = orchestrator
        .run(PipelineRequest {
            prompt: prompt.to_string(),
            duration_secs: duration,
            style: request.style.unwrap_or_default(),
            segment_length,
        })
        .await;

    Ok(Json(GenerateVideoResponse {
        success: result.success,
        job_id: result.job_id,
        segments: result.segments,
        total_duration: result.total_duration_secs,
        cost: result.cost_usd,
        error: result.error,
    }))
}

/// Get a video job record
pub async fn get_video_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<VideoJob>> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or(AppError::JobNotFound { id: job_id })?;
    Ok(Json(job))
}

/// Request cancellation of a running job. Idempotent: a terminal job is
/// acknowledged with its current status rather than rejected.
pub async fn cancel_video_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<CancelJobResponse>)> {
    let status = state
        .jobs
        .cancel(&job_id)
        .await
        .ok_or_else(|| AppError::JobNotFound {
            id: job_id.clone(),
        })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelJobResponse { job_id, status }),
    ))
}
