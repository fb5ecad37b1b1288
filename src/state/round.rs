use super::{ensure_drawing, GameSession, SessionError};
use crate::canvas::{CanvasImage, StrokeOutcome};
use crate::prompt::prompt_or_fallback;
use crate::protocol::ServerMessage;
use crate::types::*;

impl GameSession {
    /// Start a new round: reset, fetch a prompt, then open the canvas and
    /// start the analysis loop and countdown.
    pub async fn start_round(&self) -> Result<RoundView, SessionError> {
        let epoch = {
            let mut state = self.state.write().await;
            self.halt_round_tasks().await;
            self.canvas.set_enabled(false).await;
            self.canvas.clear().await;

            state.epoch += 1;
            state.canvas_generation += 1;
            state.round = Round::new();
            tracing::info!("Starting round {}", state.round.id);
            state.epoch
        };
        self.broadcast(ServerMessage::CanvasCleared);
        self.broadcast_round().await;

        let phrase = prompt_or_fallback(self.prompts.as_ref()).await;

        {
            let mut state = self.state.write().await;
            if state.epoch != epoch {
                tracing::info!("Round replaced while fetching its prompt, dropping {:?}", phrase);
                return Err(SessionError::RoundSuperseded);
            }

            let deadline = chrono::Utc::now()
                + chrono::Duration::seconds(i64::from(self.config.drawing_seconds));
            state.round.target_phrase = phrase;
            state.round.phase = Phase::Drawing;
            state.round.deadline = Some(deadline.to_rfc3339());
            tracing::info!("Round {} is drawing {:?}", state.round.id, state.round.target_phrase);

            self.canvas.set_enabled(true).await;
            self.spawn_round_tasks(epoch).await;
        }

        self.broadcast_round().await;
        Ok(self.snapshot().await)
    }

    /// Halt polling and the countdown and end an active round without analysis.
    /// No-op when no round is active.
    pub async fn stop_round(&self) -> RoundView {
        {
            let mut state = self.state.write().await;
            self.finish_locked(&mut state).await;
        }
        self.broadcast_round().await;
        self.snapshot().await
    }

    /// Submit the drawing early: one last analysis pass, then the round ends
    pub async fn submit_round(&self) -> Result<RoundView, SessionError> {
        self.finalize_round(None).await
    }

    /// Countdown for the round with the given epoch ran out
    pub(crate) async fn handle_time_up(&self, epoch: u64) {
        tracing::info!("Time is up for round epoch {}", epoch);
        if let Err(e) = self.finalize_round(Some(epoch)).await {
            tracing::debug!("Ignoring expiry: {}", e);
        }
    }

    /// Wipe the drawing and every guess made so far; the round keeps running
    pub async fn clear_canvas(&self) -> Result<RoundView, SessionError> {
        {
            let mut state = self.state.write().await;
            ensure_drawing(&state, "clear the canvas")?;
            self.canvas.clear().await;
            state.canvas_generation += 1;
            state.round.has_user_drawn = false;
            state.round.reset_guesses();
            tracing::debug!("Canvas cleared (generation {})", state.canvas_generation);
        }
        self.broadcast(ServerMessage::CanvasCleared);
        self.broadcast_round().await;
        Ok(self.snapshot().await)
    }

    /// Abandon whatever is running and return to the start screen.
    /// Scores are kept.
    pub async fn start_over(&self) -> RoundView {
        {
            let mut state = self.state.write().await;
            self.halt_round_tasks().await;
            self.canvas.set_enabled(false).await;
            self.canvas.clear().await;
            state.epoch += 1;
            state.canvas_generation += 1;
            state.round = Round::new();
            tracing::info!("Starting over");
        }
        self.broadcast(ServerMessage::CanvasCleared);
        self.broadcast_round().await;
        self.snapshot().await
    }

    /// Apply a raster update from the client. Returns whether the surface took it.
    pub async fn record_stroke(&self, image: String) -> Result<bool, SessionError> {
        let image = CanvasImage::from_data_url(image, self.config.max_snapshot_bytes)
            .map_err(SessionError::InvalidSnapshot)?;

        let started = {
            let mut state = self.state.write().await;
            ensure_drawing(&state, "draw")?;
            match self.canvas.apply_stroke(image).await {
                StrokeOutcome::Rejected => return Ok(false),
                StrokeOutcome::Continued => false,
                StrokeOutcome::Started => {
                    state.round.has_user_drawn = true;
                    tracing::debug!("User started drawing in round {}", state.round.id);
                    true
                }
            }
        };

        if started {
            self.broadcast_round().await;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_round_opens_canvas() {
        let h = harness("sunflower").await;
        let view = h.session.start_round().await.unwrap();

        assert_eq!(view.phase, Phase::Drawing);
        assert_eq!(view.target_phrase, "sunflower");
        assert!(view.drawing_enabled);
        assert!(!view.has_user_drawn);
        assert!(view.deadline.is_some());
        assert!(h.session.is_polling().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_round_replaces_previous_round() {
        let h = harness("cat").await;
        let first = h.session.start_round().await.unwrap();
        h.session.record_stroke(stroke()).await.unwrap();

        let second = h.session.start_round().await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(!second.has_user_drawn);
        assert!(second.guesses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stroke_marks_draw_start_once() {
        let h = harness("cat").await;
        let mut rx = h.session.subscribe();
        h.session.start_round().await.unwrap();
        while rx.try_recv().is_ok() {}

        let round_updates = |rx: &mut tokio::sync::broadcast::Receiver<ServerMessage>| {
            let mut count = 0;
            while let Ok(msg) = rx.try_recv() {
                if matches!(msg, ServerMessage::Round { .. }) {
                    count += 1;
                }
            }
            count
        };

        assert!(h.session.record_stroke(stroke()).await.unwrap());
        assert!(h.session.snapshot().await.has_user_drawn);
        assert_eq!(round_updates(&mut rx), 1);

        assert!(h.session.record_stroke(stroke()).await.unwrap());
        assert_eq!(round_updates(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_stroke_outside_drawing_is_rejected() {
        let h = harness("cat").await;
        let err = h.session.record_stroke(stroke()).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidPhase { phase: Phase::Idle, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_snapshot_is_rejected() {
        let h = harness("cat").await;
        h.session.start_round().await.unwrap();
        let err = h
            .session
            .record_stroke("not a data url".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SNAPSHOT");
        assert!(!h.session.snapshot().await.has_user_drawn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_canvas_resets_drawing_and_guesses() {
        let h = harness("cat").await;
        h.session.start_round().await.unwrap();
        h.session.record_stroke(stroke()).await.unwrap();
        h.session
            .state
            .write()
            .await
            .round
            .guesses
            .insert(MODEL_A.to_string(), Guess::Answer("dog".to_string()));

        let view = h.session.clear_canvas().await.unwrap();
        assert_eq!(view.phase, Phase::Drawing);
        assert!(!view.has_user_drawn);
        assert!(view.guesses.is_empty());
        assert!(view.drawing_enabled);
        assert!(h.session.is_polling().await);
    }

    #[tokio::test]
    async fn test_clear_canvas_requires_drawing() {
        let h = harness("cat").await;
        assert!(h.session.clear_canvas().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_round_is_idempotent() {
        let h = harness("cat").await;
        h.session.start_round().await.unwrap();

        let view = h.session.stop_round().await;
        assert_eq!(view.phase, Phase::Finished);
        assert!(!view.drawing_enabled);
        assert!(!h.session.is_polling().await);

        let again = h.session.stop_round().await;
        assert_eq!(again.phase, Phase::Finished);
        assert_eq!(again.id, view.id);
    }

    #[tokio::test]
    async fn test_stop_round_when_idle_does_nothing() {
        let h = harness("cat").await;
        let view = h.session.stop_round().await;
        assert_eq!(view.phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_over_returns_to_idle_and_keeps_scores() {
        let h = harness("cat").await;
        h.session.start_round().await.unwrap();
        h.guesser.answer(MODEL_A, "cat");
        h.session.record_stroke(stroke()).await.unwrap();
        h.session.submit_round().await.unwrap();

        let view = h.session.start_over().await;
        assert_eq!(view.phase, Phase::Idle);
        assert!(view.target_phrase.is_empty());
        assert!(!view.drawing_enabled);
        assert!(!h.session.is_polling().await);

        let ranking = h.session.ranking().await;
        assert_eq!(ranking[0].id, MODEL_A);
        assert_eq!(ranking[0].score, 1);
    }

    #[tokio::test]
    async fn test_handle_time_up_ignores_stale_epoch() {
        let h = harness("cat").await;
        h.session.handle_time_up(42).await;
        assert_eq!(h.session.snapshot().await.phase, Phase::Idle);
        assert_eq!(h.guesser.batches(2), 0);
    }
}
