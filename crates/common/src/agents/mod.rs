//! File-backed agent config store
//!
//! One JSON file per agent under a configured directory, read on each
//! inference request. Corrupt files are skipped with a warning during
//! listing and surface as not-found on direct reads.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::AgentConfig;

#[derive(Clone)]
pub struct AgentStore {
    dir: PathBuf,
}

impl AgentStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn create(&self, agent: &AgentConfig) -> Result<()> {
        self.ensure_dir().await?;
        let json = serde_json::to_vec_pretty(agent)?;
        tokio::fs::write(self.path_for(agent.id), json).await?;
        tracing::info!(agent_id = %agent.id, name = %agent.name, "Agent created");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<AgentConfig> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path).await.map_err(|_| AppError::AgentNotFound {
            id: id.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(agent_id = %id, error = %e, "Corrupt agent file");
            AppError::AgentNotFound { id: id.to_string() }
        })
    }

    /// All agents, sorted by most recently updated
    pub async fn list(&self) -> Result<Vec<AgentConfig>> {
        let mut agents = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Missing directory means no agents yet
            Err(_) => return Ok(agents),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<AgentConfig>(&bytes) {
                    Ok(agent) => agents.push(agent),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt agent file");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable agent file");
                }
            }
        }

        agents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(agents)
    }

    /// Overwrite an existing agent, preserving its creation time
    pub async fn update(&self, updated: AgentConfig) -> Result<AgentConfig> {
        let existing = self.get(updated.id).await?;
        let agent = AgentConfig {
            created_at: existing.created_at,
            updated_at: chrono::Utc::now(),
            ..updated
        };
        let json = serde_json::to_vec_pretty(&agent)?;
        tokio::fs::write(self.path_for(agent.id), json).await?;
        Ok(agent)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.path_for(id);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|_| AppError::AgentNotFound { id: id.to_string() })?;
        tracing::info!(agent_id = %id, "Agent deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> AgentStore {
        let dir = std::env::temp_dir().join(format!("reelsmith-agents-{}", Uuid::new_v4()));
        AgentStore::new(dir)
    }

    fn sample_agent(name: &str) -> AgentConfig {
        AgentConfig::new(
            name.to_string(),
            "You are a helpful assistant.".to_string(),
            "grok-3-mini".to_string(),
            0.7,
        )
    }

    #[tokio::test]
    async fn test_create_get_round_trip() {
        let store = temp_store();
        let agent = sample_agent("writer");
        store.create(&agent).await.unwrap();

        let loaded = store.get(agent.id).await.unwrap();
        assert_eq!(loaded.name, "writer");
        assert_eq!(loaded.system_prompt, agent.system_prompt);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = temp_store();
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(AppError::AgentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_files() {
        let store = temp_store();
        let agent = sample_agent("ok");
        store.create(&agent).await.unwrap();
        tokio::fs::write(store.dir.join("broken.json"), b"{not json")
            .await
            .unwrap();

        let agents = store.list().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "ok");
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let store = temp_store();
        let agent = sample_agent("v1");
        store.create(&agent).await.unwrap();

        let mut changed = agent.clone();
        changed.name = "v2".to_string();
        let saved = store.update(changed).await.unwrap();

        assert_eq!(saved.name, "v2");
        assert_eq!(saved.created_at, agent.created_at);
        assert!(saved.updated_at >= agent.updated_at);
    }

    #[tokio::test]
    async fn test_delete_then_get_fails() {
        let store = temp_store();
        let agent = sample_agent("gone");
        store.create(&agent).await.unwrap();
        store.delete(agent.id).await.unwrap();
        assert!(store.get(agent.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_empty_dir() {
        let store = temp_store();
        assert!(store.list().await.unwrap().is_empty());
    }
}
