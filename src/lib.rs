// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod canvas;
pub mod guess;
pub mod llm;
pub mod matching;
pub mod prompt;
pub mod protocol;
pub mod state;
pub mod store;
pub mod timer;
pub mod types;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// HTTP router: WebSocket, JSON API and the static browser client
pub fn router(session: state::GameSession) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/models", get(api::list_models))
        .route("/api/round", get(api::current_round))
        .route("/api/scores/reset", post(api::reset_scores))
        .fallback_service(ServeDir::new("static"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(session)
}
