//! WebSocket message dispatch

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{GameSession, SessionError};
use crate::types::RoundView;

fn error_message(e: SessionError) -> ServerMessage {
    ServerMessage::Error {
        code: e.code().to_string(),
        msg: e.to_string(),
    }
}

fn round_or_error(result: Result<RoundView, SessionError>) -> Option<ServerMessage> {
    match result {
        Ok(round) => Some(ServerMessage::Round { round }),
        Err(e) => {
            tracing::debug!("Command rejected: {}", e);
            Some(error_message(e))
        }
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(msg: ClientMessage, session: &GameSession) -> Option<ServerMessage> {
    match msg {
        ClientMessage::StartRound => round_or_error(session.start_round().await),

        // Strokes arrive at pointer rate, only failures are answered
        ClientMessage::Stroke { image } => match session.record_stroke(image).await {
            Ok(_) => None,
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::SubmitDrawing => round_or_error(session.submit_round().await),

        ClientMessage::StopRound => Some(ServerMessage::Round {
            round: session.stop_round().await,
        }),

        ClientMessage::ClearCanvas => round_or_error(session.clear_canvas().await),

        ClientMessage::ResetScores => Some(ServerMessage::Scores {
            models: session.reset_scores().await,
        }),

        ClientMessage::StartOver => Some(ServerMessage::Round {
            round: session.start_over().await,
        }),

        ClientMessage::RequestState => Some(ServerMessage::Round {
            round: session.snapshot().await,
        }),
    }
}
