//! Per-session usage metering entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Billable action kinds metered against the free tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AgentCall,
    VideoGeneration,
    SpeechSynthesis,
    ImageGeneration,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::AgentCall => "agent_call",
            ActionKind::VideoGeneration => "video_generation",
            ActionKind::SpeechSynthesis => "speech_synthesis",
            ActionKind::ImageGeneration => "image_generation",
        }
    }
}

/// Per-session, per-month counters.
///
/// Keyed in the store by `<session>:<YYYY-MM>`, so the monthly reset is a
/// key rollover, never an in-place reset: within a month the counters only
/// grow.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Counts per action kind
    pub counts: HashMap<ActionKind, u64>,
    /// Accumulated estimated cost in USD
    pub cost_usd: f64,
    /// True once a payment method is on file; lifts all quotas
    pub has_payment_method: bool,
    /// Billing customer id, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// First tracked action this month
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_action_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    pub fn count(&self, kind: ActionKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Answer to "is this action allowed right now"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
}

/// Build the store key for a session in a given month
pub fn month_key(session_id: &str, at: DateTime<Utc>) -> String {
    format!("{}:{}", session_id, at.format("%Y-%m"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_key_rollover() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2026, 2, 1, 0, 1, 0).unwrap();
        assert_eq!(month_key("s1", jan), "s1:2026-01");
        assert_eq!(month_key("s1", feb), "s1:2026-02");
        assert_ne!(month_key("s1", jan), month_key("s1", feb));
    }

    #[test]
    fn test_empty_record_counts_zero() {
        let record = UsageRecord::default();
        assert_eq!(record.count(ActionKind::AgentCall), 0);
        assert!(!record.has_payment_method);
    }
}
