use super::{ensure_drawing, GameSession, SessionError};
use crate::matching::matches;
use crate::types::*;
use std::collections::BTreeSet;

/// Merge fresh guesses into the round and judge them against the target.
///
/// Models missing from `guesses` keep their previous answer. Error markers
/// never count as correct. Returns the models that guessed right.
pub(crate) fn merge_and_judge(round: &mut Round, guesses: GuessRecord) -> BTreeSet<ModelId> {
    let correct: BTreeSet<ModelId> = guesses
        .iter()
        .filter_map(|(model_id, guess)| match guess {
            Guess::Answer(text) if matches(text, &round.target_phrase) => Some(model_id.clone()),
            _ => None,
        })
        .collect();

    round.guesses.extend(guesses);
    if !correct.is_empty() {
        round.correct = correct.clone();
        round.has_correct_guess = true;
    }
    correct
}

impl GameSession {
    /// One pass of the analysis loop for the round with the given epoch.
    /// Returns false once the loop should stop.
    pub(crate) async fn analysis_tick(&self, epoch: u64) -> bool {
        let (generation, image) = {
            let state = self.state.read().await;
            if state.epoch != epoch || state.round.phase != Phase::Drawing {
                return false;
            }
            if !state.round.has_user_drawn || state.round.has_correct_guess {
                return true;
            }
            (state.canvas_generation, self.canvas.export_image().await)
        };

        let guesses = self.guesser.guess_all(&image, &self.model_ids()).await;

        let scored = {
            let mut state = self.state.write().await;
            if state.epoch != epoch || state.round.phase != Phase::Drawing {
                tracing::debug!("Discarding analysis of a round that already ended");
                return false;
            }
            if state.canvas_generation != generation || state.round.has_correct_guess {
                tracing::debug!("Discarding analysis of an outdated canvas");
                return true;
            }

            let correct = merge_and_judge(&mut state.round, guesses);
            if correct.is_empty() {
                false
            } else {
                tracing::info!("Correct guess by {:?}", correct);
                self.award_points(&correct).await;
                self.finish_locked(&mut state).await;
                true
            }
        };

        self.broadcast_round().await;
        !scored
    }

    /// Close the drawing phase with one last analysis of the canvas.
    ///
    /// With `expected_epoch` set the call is dropped if the round has been
    /// replaced since (countdown expiry of an older round).
    pub(crate) async fn finalize_round(
        &self,
        expected_epoch: Option<u64>,
    ) -> Result<RoundView, SessionError> {
        let epoch = {
            let mut state = self.state.write().await;
            if expected_epoch.is_some_and(|expected| expected != state.epoch) {
                return Err(SessionError::RoundSuperseded);
            }
            ensure_drawing(&state, "submit the drawing")?;

            if state.round.has_correct_guess {
                self.finish_locked(&mut state).await;
                None
            } else {
                self.halt_round_tasks().await;
                self.canvas.set_enabled(false).await;
                state.round.phase = Phase::FinalAnalysis;
                state.round.deadline = None;
                tracing::info!("Final analysis for round {}", state.round.id);
                Some(state.epoch)
            }
        };
        self.broadcast_round().await;

        let Some(epoch) = epoch else {
            return Ok(self.snapshot().await);
        };

        let image = self.canvas.export_image().await;
        let guesses = self.guesser.guess_all(&image, &self.model_ids()).await;

        {
            let mut state = self.state.write().await;
            if state.epoch != epoch || state.round.phase != Phase::FinalAnalysis {
                tracing::info!("Round replaced during final analysis, discarding results");
                return Err(SessionError::RoundSuperseded);
            }

            let correct = merge_and_judge(&mut state.round, guesses);
            if !correct.is_empty() {
                self.award_points(&correct).await;
            }
            self.finish_locked(&mut state).await;
        }

        self.broadcast_round().await;
        Ok(self.snapshot().await)
    }
}
