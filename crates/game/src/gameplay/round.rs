use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::economy::EconomyState;
use super::stats::ProgressionStats;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoundState {
    #[default]
    Preparation,
    Playing,
    GameOver,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preparation => "preparation",
            Self::Playing => "playing",
            Self::GameOver => "game_over",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundEvent {
    StateChanged { from: RoundState, to: RoundState },
    TimerUpdated { remaining: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("round is not playing")]
    NotPlaying,
    #[error("time extension must be positive")]
    InvalidAmount,
}

/// What the actor layer needs to populate a fresh round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSetup {
    pub initial_chickens: u32,
    pub max_chickens: u32,
    pub attack_damage: f32,
    pub attack_radius: f32,
    pub attack_interval: f32,
}

impl RoundSetup {
    pub fn from_stats(stats: &ProgressionStats) -> Self {
        Self {
            initial_chickens: stats.initial_chickens(),
            max_chickens: stats.max_chickens(),
            attack_damage: stats.attack_damage,
            attack_radius: stats.attack_radius,
            attack_interval: stats.attack_interval,
        }
    }
}

/// Spawns and removes the chickens, eggs and predators of a round.
pub trait ActorLayer {
    fn clear_all_actors(&mut self);
    fn configure_round(&mut self, setup: &RoundSetup);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSummary {
    pub eggs_banked: u64,
    pub duration_played: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&RoundEvent, &EconomyState)>;

#[derive(Default)]
pub struct RoundController {
    state: RoundState,
    remaining_time: f32,
    round_duration: f32,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
    actors: Option<Box<dyn ActorLayer>>,
}

impl fmt::Debug for RoundController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundController")
            .field("state", &self.state)
            .field("remaining_time", &self.remaining_time)
            .field("round_duration", &self.round_duration)
            .field("listener_count", &self.listeners.len())
            .field("has_actor_layer", &self.actors.is_some())
            .finish()
    }
}

impl RoundController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_actor_layer(&mut self, actors: Box<dyn ActorLayer>) {
        self.actors = Some(actors);
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn remaining_time(&self) -> f32 {
        self.remaining_time
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&RoundEvent, &EconomyState) + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Preparation -> Playing. Returns whether the round started.
    pub fn start_round(&mut self, economy: &mut EconomyState, stats: &ProgressionStats) -> bool {
        match self.state {
            RoundState::Preparation => {}
            RoundState::Playing => return false,
            RoundState::GameOver => {
                warn!(state = %self.state, "start_round_ignored");
                return false;
            }
        }

        self.clear_actors();
        economy.reset_session();
        let setup = RoundSetup::from_stats(stats);
        match self.actors.as_mut() {
            Some(actors) => actors.configure_round(&setup),
            None => warn!(collaborator = "actor_layer", "misconfigured_collaborator"),
        }
        self.round_duration = stats.session_duration.max(0.0);
        self.remaining_time = self.round_duration;

        let from = std::mem::replace(&mut self.state, RoundState::Playing);
        info!(
            duration = self.round_duration,
            initial_chickens = setup.initial_chickens,
            max_chickens = setup.max_chickens,
            "round_started"
        );
        self.emit(&RoundEvent::StateChanged { from, to: self.state }, economy);
        self.emit(
            &RoundEvent::TimerUpdated {
                remaining: self.remaining_time,
            },
            economy,
        );
        true
    }

    /// Counts the timer down; ends the round when it reaches zero.
    pub fn tick(&mut self, dt_seconds: f32, economy: &mut EconomyState) -> Option<RoundSummary> {
        if self.state != RoundState::Playing {
            return None;
        }
        self.remaining_time = (self.remaining_time - dt_seconds.max(0.0)).max(0.0);
        self.emit(
            &RoundEvent::TimerUpdated {
                remaining: self.remaining_time,
            },
            economy,
        );
        if self.remaining_time <= 0.0 {
            return Some(self.finish_round(economy, "timer_expired"));
        }
        None
    }

    /// Playing -> GameOver on request; ignored in any other state.
    pub fn end_round(&mut self, economy: &mut EconomyState) -> Option<RoundSummary> {
        if self.state != RoundState::Playing {
            info!(state = %self.state, "end_round_ignored");
            return None;
        }
        Some(self.finish_round(economy, "end_command"))
    }

    /// GameOver or Playing -> Preparation. Nothing but the state changes.
    pub fn return_to_preparation(&mut self, economy: &EconomyState) -> bool {
        if self.state == RoundState::Preparation {
            return false;
        }
        let from = std::mem::replace(&mut self.state, RoundState::Preparation);
        debug!(from = %from, "returned_to_preparation");
        self.emit(&RoundEvent::StateChanged { from, to: self.state }, economy);
        true
    }

    pub fn extend_time(&mut self, amount: f32, economy: &EconomyState) -> Result<f32, RoundError> {
        if self.state != RoundState::Playing {
            return Err(RoundError::NotPlaying);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RoundError::InvalidAmount);
        }
        self.remaining_time += amount;
        self.round_duration += amount;
        self.emit(
            &RoundEvent::TimerUpdated {
                remaining: self.remaining_time,
            },
            economy,
        );
        Ok(self.remaining_time)
    }

    fn finish_round(&mut self, economy: &mut EconomyState, reason: &'static str) -> RoundSummary {
        let from = std::mem::replace(&mut self.state, RoundState::GameOver);
        // Listeners still see the unbanked session total here.
        self.emit(&RoundEvent::StateChanged { from, to: self.state }, economy);
        let eggs_banked = economy.bank_session();
        self.clear_actors();

        let summary = RoundSummary {
            eggs_banked,
            duration_played: self.round_duration - self.remaining_time,
        };
        info!(
            reason,
            eggs_banked,
            duration_played = summary.duration_played,
            banked_total = economy.banked(),
            "round_ended"
        );
        summary
    }

    fn clear_actors(&mut self) {
        match self.actors.as_mut() {
            Some(actors) => actors.clear_all_actors(),
            None => warn!(collaborator = "actor_layer", "misconfigured_collaborator"),
        }
    }

    fn emit(&mut self, event: &RoundEvent, economy: &EconomyState) {
        for (_, listener) in &mut self.listeners {
            listener(event, economy);
        }
    }
}
