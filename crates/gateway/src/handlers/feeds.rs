//! Feed aggregation handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use reelsmith_common::{errors::Result, feeds::FeedItem};

#[derive(Serialize)]
pub struct FeedsResponse {
    pub count: usize,
    pub items: Vec<FeedItem>,
}

/// Aggregated items from all configured sources, newest first. Failing
/// sources contribute nothing; partial results are a success.
pub async fn list_feeds(State(state): State<AppState>) -> Result<Json<FeedsResponse>> {
    let items = state.feeds.aggregate().await?;
    Ok(Json(FeedsResponse {
        count: items.len(),
        items,
    }))
}
