use crate::timer::Urgency;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Fetch a prompt and start drawing
    StartRound,
    /// Latest canvas raster as a data URL; the first one of a round marks the draw start
    Stroke {
        image: String,
    },
    SubmitDrawing,
    /// End the round without a final analysis
    StopRound,
    ClearCanvas,
    ResetScores,
    /// Back to the start screen
    StartOver,
    RequestState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        round: RoundView,
        models: Vec<ModelProfile>,
        server_now: String,
    },
    Round {
        round: RoundView,
    },
    Timer {
        remaining_seconds: u32,
        total_seconds: u32,
        label: String,
        urgency: Urgency,
    },
    /// Ranking, highest score first
    Scores {
        models: Vec<ModelProfile>,
    },
    CanvasCleared,
    Error {
        code: String,
        msg: String,
    },
}
