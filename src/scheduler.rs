use std::time::{Duration, Instant};

use crate::state::{GameStatus, Lane};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No game selected.
    Idle,
    Active,
    /// Drive overlay open: ticks keep firing but do no work.
    Paused,
    /// Game reported complete; the timer is disarmed.
    Settled,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneFetch {
    pub lane: Lane,
    pub silent: bool,
}

impl LaneFetch {
    fn foreground(lane: Lane) -> Self {
        Self {
            lane,
            silent: false,
        }
    }

    fn background(lane: Lane) -> Self {
        Self { lane, silent: true }
    }
}

/// Decides which lanes to fetch and when. Holds no I/O; the provider thread
/// feeds it the clock and observed status.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    interval: Duration,
    phase: SchedulerPhase,
    game_id: Option<String>,
    next_tick: Option<Instant>,
    scheduled: bool,
    completed: bool,
    /// Token of the newest summary whose status was observed.
    status_token: u64,
    overlay_open: bool,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            phase: SchedulerPhase::Idle,
            game_id: None,
            next_tick: None,
            scheduled: false,
            completed: false,
            status_token: 0,
            overlay_open: false,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Arms the timer for `game_id` and returns the initial foreground loads.
    pub fn select_game(&mut self, game_id: &str, now: Instant) -> Vec<LaneFetch> {
        if self.phase == SchedulerPhase::Stopped {
            return Vec::new();
        }
        self.game_id = Some(game_id.to_string());
        self.scheduled = false;
        self.completed = false;
        self.status_token = 0;
        self.phase = if self.overlay_open {
            SchedulerPhase::Paused
        } else {
            SchedulerPhase::Active
        };
        self.next_tick = Some(now + self.interval);
        Lane::ALL.into_iter().map(LaneFetch::foreground).collect()
    }

    /// Records the status of a resolved summary. A summary issued before the
    /// newest one already observed is ignored.
    pub fn observe_status(&mut self, game_id: &str, token: u64, status: &GameStatus) {
        if self.game_id.as_deref() != Some(game_id) || token <= self.status_token {
            return;
        }
        self.status_token = token;
        self.scheduled = status.is_scheduled();
        self.completed = status.completed;
    }

    pub fn tick(&mut self, now: Instant) -> Vec<LaneFetch> {
        if !matches!(self.phase, SchedulerPhase::Active | SchedulerPhase::Paused) {
            return Vec::new();
        }
        let Some(due) = self.next_tick else {
            return Vec::new();
        };
        if now < due {
            return Vec::new();
        }
        if self.completed {
            self.phase = SchedulerPhase::Settled;
            self.next_tick = None;
            return Vec::new();
        }

        let next = due + self.interval;
        self.next_tick = Some(if next <= now { now + self.interval } else { next });

        if self.phase == SchedulerPhase::Paused {
            return Vec::new();
        }
        let mut fetches = vec![LaneFetch::background(Lane::Summary)];
        if !self.scheduled {
            fetches.push(LaneFetch::background(Lane::Drives));
            fetches.push(LaneFetch::background(Lane::Situation));
        }
        fetches
    }

    /// Opening pauses ticks. Closing resumes and returns an immediate foreground
    /// refresh, also when the game settled while the overlay was open.
    pub fn set_overlay_open(&mut self, open: bool) -> Vec<LaneFetch> {
        if open == self.overlay_open {
            return Vec::new();
        }
        self.overlay_open = open;
        match (open, self.phase) {
            (true, SchedulerPhase::Active) => {
                self.phase = SchedulerPhase::Paused;
                Vec::new()
            }
            (false, SchedulerPhase::Paused) => {
                self.phase = SchedulerPhase::Active;
                Lane::ALL.into_iter().map(LaneFetch::foreground).collect()
            }
            (false, SchedulerPhase::Settled) => {
                Lane::ALL.into_iter().map(LaneFetch::foreground).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Manual reload of every lane for the current game.
    pub fn refresh(&self) -> Vec<LaneFetch> {
        match self.phase {
            SchedulerPhase::Active | SchedulerPhase::Paused | SchedulerPhase::Settled => {
                Lane::ALL.into_iter().map(LaneFetch::foreground).collect()
            }
            SchedulerPhase::Idle | SchedulerPhase::Stopped => Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        self.phase = SchedulerPhase::Stopped;
        self.game_id = None;
        self.next_tick = None;
    }
}
