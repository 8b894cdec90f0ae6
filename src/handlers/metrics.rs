// Metrics endpoint

use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::metrics::collector::MetricsSnapshot;
use crate::models::user::Principal;
use crate::security::auth_layer::require_admin;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;

/// Returns counters for sessions opened, marks recorded and rejected,
/// manual overrides and failed logins, plus store sizes and uptime.
///
/// Admins only.
pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    require_admin(&principal)?;

    let snapshot = state
        .metrics
        .get_snapshot(&state.identity, &state.sessions, &state.ledger);
    Ok(Json(snapshot))
}
