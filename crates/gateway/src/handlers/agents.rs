//! Agent config CRUD and streamed agent runs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Extension, Json,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{require_quota, validated};
use crate::middleware::session::SessionId;
use crate::AppState;
use reelsmith_common::{
    errors::Result,
    models::{ActionKind, AgentConfig},
};

/// Request to create a new agent
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(min = 1, max = 10000))]
    pub system_prompt: String,

    /// Defaults to the configured chat model
    pub model: Option<String>,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub tools: Vec<String>,
}

/// Request to run an agent against one user message
#[derive(Debug, Deserialize, Validate)]
pub struct RunAgentRequest {
    pub agent_id: Uuid,

    #[validate(length(min = 1, max = 20000))]
    pub user_message: String,
}

/// Create a new agent config
pub async fn create_agent(
    State(state): State<AppState>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentConfig>)> {
    validated(&request)?;

    let mut agent = AgentConfig::new(
        request.name,
        request.system_prompt,
        request
            .model
            .unwrap_or_else(|| state.config.vendors.xai.chat_model.clone()),
        request.temperature.unwrap_or(0.7),
    );
    agent.tools = request.tools;

    state.agents.create(&agent).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// List all agents, most recently updated first
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<AgentConfig>>> {
    Ok(Json(state.agents.list().await?))
}

/// Get an agent by id
pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<AgentConfig>> {
    Ok(Json(state.agents.get(agent_id).await?))
}

/// Replace an agent config; creation time is preserved
pub async fn update_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<CreateAgentRequest>,
) -> Result<Json<AgentConfig>> {
    validated(&request)?;

    let existing = state.agents.get(agent_id).await?;
    let updated = AgentConfig {
        id: agent_id,
        name: request.name,
        system_prompt: request.system_prompt,
        model: request.model.unwrap_or(existing.model),
        temperature: request.temperature.unwrap_or(existing.temperature),
        tools: request.tools,
        ..existing
    };

    Ok(Json(state.agents.update(updated).await?))
}

/// Delete an agent
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.agents.delete(agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run an agent and stream the reply as SSE.
///
/// Each content delta arrives as `data: {"content": "..."}` and the stream
/// is terminated by `data: [DONE]`. Usage is tracked once the upstream
/// stream is established; a mid-stream vendor error is delivered inline as
/// `data: {"error": "..."}` since the response status is already committed.
pub async fn run_agent(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(request): Json<RunAgentRequest>,
) -> Result<impl IntoResponse> {
    validated(&request)?;

    let agent = state.agents.get(request.agent_id).await?;
    require_quota(&state, &session_id, ActionKind::AgentCall).await?;

    let chat = state.vendors.chat()?.clone();
    let deltas = chat
        .stream(
            &agent.system_prompt,
            &request.user_message,
            &agent.model,
            agent.temperature,
        )
        .await?;

    state
        .usage
        .track(&session_id, ActionKind::AgentCall, 1, 0.0)
        .await;
    tracing::info!(
        agent_id = %agent.id,
        session_id = %session_id,
        model = %agent.model,
        "Agent run started"
    );

    let events = deltas
        .map(|delta| {
            let payload = match delta {
                Ok(content) => serde_json::json!({ "content": content }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            };
            Ok::<_, Infallible>(Event::default().data(payload.to_string()))
        })
        .chain(futures::stream::once(async {
            Ok(Event::default().data("[DONE]"))
        }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
