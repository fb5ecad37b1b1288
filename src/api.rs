//! HTTP API endpoints for displays that do not hold a WebSocket.

use axum::{extract::State, Json};

use crate::state::GameSession;
use crate::types::{ModelProfile, RoundView};

/// Ranking of the guessing models.
///
/// GET /api/models
pub async fn list_models(State(session): State<GameSession>) -> Json<Vec<ModelProfile>> {
    Json(session.ranking().await)
}

/// Current round.
///
/// GET /api/round
pub async fn current_round(State(session): State<GameSession>) -> Json<RoundView> {
    Json(session.snapshot().await)
}

/// Zero all scores.
///
/// POST /api/scores/reset
pub async fn reset_scores(State(session): State<GameSession>) -> Json<Vec<ModelProfile>> {
    Json(session.reset_scores().await)
}
