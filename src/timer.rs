//! Drawing countdown.

use serde::{Deserialize, Serialize};

/// Color band of the countdown bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Calm,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining: u32 },
    /// Countdown reached zero; emitted once per start
    Expired,
}

/// Second-granularity countdown driven by an external one-second tick
#[derive(Debug, Clone)]
pub struct Countdown {
    duration: u32,
    remaining: u32,
    active: bool,
}

impl Countdown {
    pub fn start(duration: u32) -> Self {
        Self {
            duration,
            remaining: duration,
            active: true,
        }
    }

    /// Advance by one second. Returns None once deactivated or expired.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if !self.active {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.active = false;
            Some(TimerEvent::Expired)
        } else {
            Some(TimerEvent::Tick {
                remaining: self.remaining,
            })
        }
    }

    /// Stop without firing expiry
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// `MM:SS`
    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }

    pub fn urgency(&self) -> Urgency {
        let remaining = self.remaining as f64;
        let duration = self.duration as f64;
        if remaining > duration * 0.6 {
            Urgency::Calm
        } else if remaining > duration * 0.3 {
            Urgency::Warning
        } else {
            Urgency::Critical
        }
    }
}
