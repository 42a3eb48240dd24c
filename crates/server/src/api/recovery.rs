use axum::{extract::State, Json};
use std::sync::Arc;

use songsmith_core::SweepReport;

use super::error::ApiError;
use crate::state::AppState;

/// Run one recovery sweep now, independent of the background interval.
pub async fn run_sweep(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>, ApiError> {
    let report = state.recovery().sweep().await?;
    Ok(Json(report))
}
