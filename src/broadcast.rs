use crate::state::GameSession;
use crate::timer::{Countdown, TimerEvent};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Spawn the periodic analysis loop for the round with the given epoch.
///
/// Runs until `stop` fires, the round leaves the drawing phase, or a model
/// guesses the drawing.
pub fn spawn_analysis_loop(session: GameSession, epoch: u64, mut stop: watch::Receiver<bool>) {
    // interval() panics on a zero period
    let period = session
        .config()
        .analysis_interval
        .max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => break,
            }

            if !session.analysis_tick(epoch).await {
                break;
            }
        }
        tracing::debug!("Analysis loop for epoch {} stopped", epoch);
    });
}

/// Spawn the drawing countdown for the round with the given epoch.
///
/// Broadcasts the remaining time every second and ends the round when it
/// runs out.
pub fn spawn_countdown(session: GameSession, epoch: u64, mut stop: watch::Receiver<bool>) {
    let duration = session.config().drawing_seconds;
    tokio::spawn(async move {
        let mut countdown = Countdown::start(duration);
        session.broadcast_timer(&countdown);

        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => {
                    countdown.deactivate();
                    break;
                }
            }

            match countdown.tick() {
                Some(TimerEvent::Tick { .. }) => session.broadcast_timer(&countdown),
                Some(TimerEvent::Expired) => {
                    session.broadcast_timer(&countdown);
                    session.handle_time_up(epoch).await;
                    break;
                }
                None => break,
            }
        }
        tracing::debug!("Countdown for epoch {} stopped", epoch);
    });
}
