//! Session usage metering store
//!
//! Decides whether a billable action is permitted and records it once
//! performed. `check` and `track` are deliberately separate calls: the
//! original contract allows concurrent requests from one session to race
//! past the quota boundary between the two steps. Each individual step is
//! atomic under the store's write lock, so counters themselves never lose
//! increments.

use chrono::Utc;

use super::MemoryStore;
use crate::config::UsageConfig;
use crate::metrics;
use crate::models::usage::{month_key, ActionKind, UsageDecision, UsageRecord};

#[derive(Clone)]
pub struct UsageStore {
    records: MemoryStore<UsageRecord>,
    config: UsageConfig,
}

impl UsageStore {
    pub fn new(config: UsageConfig) -> Self {
        Self {
            records: MemoryStore::new(),
            config,
        }
    }

    fn limit_for(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::AgentCall => self.config.free_agent_calls,
            ActionKind::VideoGeneration => self.config.free_video_generations,
            ActionKind::SpeechSynthesis => self.config.free_speech_syntheses,
            ActionKind::ImageGeneration => self.config.free_image_generations,
        }
    }

    pub fn upgrade_url(&self) -> &str {
        &self.config.upgrade_url
    }

    /// Decide whether `kind` is currently permitted for this session.
    /// Allowed when a payment method is on file, or the free quota for
    /// the current month is not exhausted.
    pub async fn check(&self, session_id: &str, kind: ActionKind) -> UsageDecision {
        let key = month_key(session_id, Utc::now());
        let limit = self.limit_for(kind);
        let record = self.records.get(&key).await.unwrap_or_default();

        if record.has_payment_method {
            return UsageDecision {
                allowed: true,
                reason: None,
                limit,
                used: record.count(kind),
                remaining: u64::MAX,
            };
        }

        let used = record.count(kind);
        if used < limit {
            UsageDecision {
                allowed: true,
                reason: None,
                limit,
                used,
                remaining: limit - used,
            }
        } else {
            metrics::record_quota_denial(kind.as_str());
            UsageDecision {
                allowed: false,
                reason: Some(format!(
                    "Free tier limit of {} {} per month reached",
                    limit,
                    kind.as_str()
                )),
                limit,
                used,
                remaining: 0,
            }
        }
    }

    /// Record `qty` performed actions and their estimated cost. Has no
    /// effect on already-issued allow decisions.
    pub async fn track(&self, session_id: &str, kind: ActionKind, qty: u64, cost_usd: f64) {
        let key = month_key(session_id, Utc::now());
        self.records
            .with_entry(&key, UsageRecord::default, |record| {
                *record.counts.entry(kind).or_insert(0) += qty;
                record.cost_usd += cost_usd;
                if record.first_action_at.is_none() {
                    record.first_action_at = Some(Utc::now());
                }
            })
            .await;
        metrics::record_usage(kind.as_str(), qty);
        tracing::debug!(
            session_id = %session_id,
            kind = kind.as_str(),
            qty,
            cost_usd,
            "Usage tracked"
        );
    }

    /// Flip the session to unlimited use once billing confirms a payment
    /// method. Applies to the current month's record.
    pub async fn set_payment_status(&self, session_id: &str, customer_id: &str) {
        let key = month_key(session_id, Utc::now());
        self.records
            .with_entry(&key, UsageRecord::default, |record| {
                record.has_payment_method = true;
                record.customer_id = Some(customer_id.to_string());
            })
            .await;
        tracing::info!(
            session_id = %session_id,
            customer_id = %customer_id,
            "Session upgraded to unlimited use"
        );
    }

    /// Current month's record for a session (empty record if untracked)
    pub async fn current(&self, session_id: &str) -> UsageRecord {
        let key = month_key(session_id, Utc::now());
        self.records.get(&key).await.unwrap_or_default()
    }
}
