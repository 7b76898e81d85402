//! Check status endpoint handler.

use axum::{extract::State, Json};
use tracing::instrument;

use crate::state::{CheckStatus, SharedState};

/// Handler for the /status endpoint.
///
/// Returns the last outcome of every check that has run at least once,
/// sorted by asset and check.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> Json<Vec<CheckStatus>> {
    let statuses = state.statuses.read().await;
    let mut list: Vec<CheckStatus> = statuses.values().cloned().collect();
    list.sort_by(|a, b| (&a.asset, &a.check).cmp(&(&b.asset, &b.check)));
    Json(list)
}
