//! Lyric generation and approval handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use songsmith_core::order::{Lyric, Track};
use songsmith_core::{GenerationOutcome, Order};

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateOutcome {
    Generated,
    AlreadyGenerated,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub outcome: GenerateOutcome,
    pub lyrics: Vec<Lyric>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub order: Order,
    pub lyric: Lyric,
    pub track: Track,
}

/// Generate the two lyric drafts of a paid order.
///
/// Repeating the call is safe: an order that already has lyrics answers with
/// the stored pair.
pub async fn generate_lyrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let response = match state.pipeline().generate_lyrics(&id).await? {
        GenerationOutcome::Generated { lyrics } => GenerateResponse {
            outcome: GenerateOutcome::Generated,
            lyrics,
        },
        GenerationOutcome::AlreadyGenerated => GenerateResponse {
            outcome: GenerateOutcome::AlreadyGenerated,
            lyrics: state.orders().store().lyrics_for_order(&id)?,
        },
    };
    Ok(Json(response))
}

/// Approve one of the caller's lyric drafts and queue production
pub async fn approve_lyric(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path((id, lyric_id)): Path<(String, String)>,
) -> Result<Json<ApproveResponse>, ApiError> {
    let record = state
        .approvals()
        .approve_lyric(&user_id, &id, &lyric_id)
        .await?;

    Ok(Json(ApproveResponse {
        order: record.transition.order,
        lyric: record.lyric,
        track: record.track,
    }))
}
