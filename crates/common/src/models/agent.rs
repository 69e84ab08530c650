//! Configured chat agent entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured chat agent, persisted as one JSON file per agent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: Uuid,
    pub name: String,
    pub system_prompt: String,
    /// Vendor model identifier, e.g. "grok-3-mini"
    pub model: String,
    pub temperature: f32,
    #[serde(default)]
    pub tools: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentConfig {
    pub fn new(name: String, system_prompt: String, model: String, temperature: f32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            system_prompt,
            model,
            temperature,
            tools: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
