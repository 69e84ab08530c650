//! Billing customer to session mapping
//!
//! Recorded when a checkout session is created so later webhook events
//! can resolve which anonymous session to upgrade.

use super::MemoryStore;

#[derive(Clone, Default)]
pub struct CustomerStore {
    sessions: MemoryStore<String>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self {
            sessions: MemoryStore::new(),
        }
    }

    pub async fn link(&self, customer_id: &str, session_id: &str) {
        self.sessions
            .insert(customer_id.to_string(), session_id.to_string())
            .await;
    }

    pub async fn session_for(&self, customer_id: &str) -> Option<String> {
        self.sessions.get(customer_id).await
    }
}
