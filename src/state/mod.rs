mod analysis;
mod round;
mod score;

use crate::canvas::DrawingSurface;
use crate::guess::GuessSource;
use crate::prompt::PromptSource;
use crate::protocol::ServerMessage;
use crate::store::KeyValueStore;
use crate::timer::Countdown;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};

/// Errors returned to clients issuing session commands
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while the round is {phase:?}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("Round was replaced before it finished")]
    RoundSuperseded,

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl SessionError {
    /// Stable code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidPhase { .. } => "INVALID_PHASE",
            SessionError::RoundSuperseded => "ROUND_SUPERSEDED",
            SessionError::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
        }
    }
}

/// External services the session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub guesser: Arc<dyn GuessSource>,
    pub prompts: Arc<dyn PromptSource>,
    pub store: Arc<dyn KeyValueStore>,
    pub canvas: Arc<dyn DrawingSurface>,
}

pub(crate) struct SessionState {
    pub round: Round,
    /// Bumped whenever the round is replaced; tasks of older rounds see a mismatch and stop
    pub epoch: u64,
    /// Bumped on every canvas clear; analysis of an older raster is discarded
    pub canvas_generation: u64,
}

#[derive(Default)]
struct RoundTasks {
    /// Stop signal shared by the analysis loop and the countdown of the active round
    stop: Option<watch::Sender<bool>>,
}

/// Game session controller
///
/// Owns the round state machine, the periodic analysis loop, the countdown
/// and the model scores. Cheap to clone; all clones share the same session.
///
/// Lock order: `state` before `models`; `tasks` and the canvas are only ever
/// taken innermost.
#[derive(Clone)]
pub struct GameSession {
    config: Arc<GameConfig>,
    state: Arc<RwLock<SessionState>>,
    models: Arc<RwLock<Vec<ModelProfile>>>,
    tasks: Arc<Mutex<RoundTasks>>,
    guesser: Arc<dyn GuessSource>,
    prompts: Arc<dyn PromptSource>,
    store: Arc<dyn KeyValueStore>,
    canvas: Arc<dyn DrawingSurface>,
    /// Broadcast channel for pushing updates to every connected client
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl GameSession {
    pub fn new(config: GameConfig, collaborators: Collaborators) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let models = config.models.clone();
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(SessionState {
                round: Round::new(),
                epoch: 0,
                canvas_generation: 0,
            })),
            models: Arc::new(RwLock::new(models)),
            tasks: Arc::new(Mutex::new(RoundTasks::default())),
            guesser: collaborators.guesser,
            prompts: collaborators.prompts,
            store: collaborators.store,
            canvas: collaborators.canvas,
            broadcast: tx,
        }
    }

    /// Create a session and load the persisted scores
    pub async fn open(config: GameConfig, collaborators: Collaborators) -> Self {
        let session = Self::new(config, collaborators);
        session.load_scores().await;
        session
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    /// Ignore send errors (no receivers connected is fine)
    pub(crate) fn broadcast(&self, msg: ServerMessage) {
        let _ = self.broadcast.send(msg);
    }

    fn model_ids(&self) -> Vec<ModelId> {
        self.config.models.iter().map(|m| m.id.clone()).collect()
    }

    fn view_of(&self, state: &SessionState, drawing_enabled: bool) -> RoundView {
        let round = &state.round;
        let guesses = self
            .config
            .models
            .iter()
            .filter_map(|model| {
                round.guesses.get(&model.id).map(|guess| GuessView {
                    model_id: model.id.clone(),
                    display_name: model.display_name.clone(),
                    color: model.color.clone(),
                    guess: guess.clone(),
                    correct: round.correct.contains(&model.id),
                })
            })
            .collect();

        RoundView {
            id: round.id.clone(),
            target_phrase: round.target_phrase.clone(),
            phase: round.phase,
            drawing_enabled,
            has_user_drawn: round.has_user_drawn,
            has_correct_guess: round.has_correct_guess,
            guesses,
            correct_models: round.correct.iter().cloned().collect(),
            deadline: round.deadline.clone(),
        }
    }

    /// Current round as shown to clients
    pub async fn snapshot(&self) -> RoundView {
        let state = self.state.read().await;
        let drawing_enabled = self.canvas.is_enabled().await;
        self.view_of(&state, drawing_enabled)
    }

    /// Must not be called while holding the state lock
    pub(crate) async fn broadcast_round(&self) {
        let round = self.snapshot().await;
        self.broadcast(ServerMessage::Round { round });
    }

    pub(crate) fn broadcast_timer(&self, countdown: &Countdown) {
        self.broadcast(ServerMessage::Timer {
            remaining_seconds: countdown.remaining(),
            total_seconds: countdown.duration(),
            label: countdown.label(),
            urgency: countdown.urgency(),
        });
    }

    /// Whether an analysis loop and countdown are registered for the current round
    pub async fn is_polling(&self) -> bool {
        self.tasks.lock().await.stop.is_some()
    }

    /// Signal the analysis loop and countdown to stop. In-flight work completes
    /// and is discarded by the guards in the tick handlers.
    async fn halt_round_tasks(&self) {
        if let Some(stop) = self.tasks.lock().await.stop.take() {
            let _ = stop.send(true);
            tracing::debug!("Round tasks halted");
        }
    }

    /// Start the analysis loop and countdown for the round with the given epoch
    async fn spawn_round_tasks(&self, epoch: u64) {
        let mut tasks = self.tasks.lock().await;
        if let Some(stop) = tasks.stop.take() {
            let _ = stop.send(true);
        }

        let (tx, rx) = watch::channel(false);
        crate::broadcast::spawn_analysis_loop(self.clone(), epoch, rx.clone());
        crate::broadcast::spawn_countdown(self.clone(), epoch, rx);
        tasks.stop = Some(tx);
    }

    /// Move an active round to Finished and halt its tasks. Caller holds the state lock.
    async fn finish_locked(&self, state: &mut SessionState) {
        self.halt_round_tasks().await;
        self.canvas.set_enabled(false).await;
        if matches!(state.round.phase, Phase::Drawing | Phase::FinalAnalysis) {
            state.round.phase = Phase::Finished;
            state.round.deadline = None;
            tracing::info!(
                "Round {} finished, correct models: {:?}",
                state.round.id,
                state.round.correct
            );
        }
    }
}

fn ensure_drawing(state: &SessionState, action: &'static str) -> Result<(), SessionError> {
    if state.round.phase == Phase::Drawing {
        Ok(())
    } else {
        Err(SessionError::InvalidPhase {
            action,
            phase: state.round.phase,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let h = harness("cat").await;
        let view = h.session.snapshot().await;
        assert_eq!(view.phase, Phase::Idle);
        assert!(view.target_phrase.is_empty());
        assert!(!view.drawing_enabled);
        assert!(!h.session.is_polling().await);
    }

    #[tokio::test]
    async fn test_view_orders_guesses_by_config() {
        let h = harness("cat").await;
        {
            let mut state = h.session.state.write().await;
            state
                .round
                .guesses
                .insert(MODEL_B.to_string(), Guess::Answer("cat".to_string()));
            state
                .round
                .guesses
                .insert(MODEL_A.to_string(), Guess::Answer("dog".to_string()));
            state.round.correct.insert(MODEL_B.to_string());
        }

        let view = h.session.snapshot().await;
        assert_eq!(view.guesses.len(), 2);
        assert_eq!(view.guesses[0].model_id, MODEL_A);
        assert!(!view.guesses[0].correct);
        assert_eq!(view.guesses[1].display_name, "Model B");
        assert!(view.guesses[1].correct);
        assert_eq!(view.correct_models, vec![MODEL_B.to_string()]);
    }

    #[test]
    fn test_error_codes() {
        let err = SessionError::InvalidPhase {
            action: "submit the drawing",
            phase: Phase::Idle,
        };
        assert_eq!(err.code(), "INVALID_PHASE");
        assert!(err.to_string().contains("submit the drawing"));
        assert_eq!(SessionError::RoundSuperseded.code(), "ROUND_SUPERSEDED");
    }
}
