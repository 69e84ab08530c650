//! API handlers module

pub mod agents;
pub mod billing;
pub mod feeds;
pub mod health;
pub mod speech;
pub mod usage;
pub mod video;

use validator::Validate;

use crate::AppState;
use reelsmith_common::errors::{AppError, Result};
use reelsmith_common::models::ActionKind;

/// Run derive-based validation, mapping failures to a 400
pub(crate) fn validated<T: Validate>(value: &T) -> Result<()> {
    value.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })
}

/// Deny with a 429 quota error when the session has exhausted its free
/// tier for `kind`. The later `track` call is a separate step; concurrent
/// requests from one session can race past this gate, which is accepted.
pub(crate) async fn require_quota(
    state: &AppState,
    session_id: &str,
    kind: ActionKind,
) -> Result<()> {
    let decision = state.usage.check(session_id, kind).await;
    if decision.allowed {
        Ok(())
    } else {
        Err(AppError::QuotaExceeded {
            kind: kind.as_str().to_string(),
            limit: decision.limit,
            used: decision.used,
            upgrade_url: state.usage.upgrade_url().to_string(),
        })
    }
}
