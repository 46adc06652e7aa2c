use std::collections::VecDeque;
use std::process::ExitCode;

use henhouse::gameplay::{GameSession, ProduceEvent, RoundState, SessionError, UpgradeStatus};
use henhouse_engine::{run_headless, LoopControl, Simulation};
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::script::{ScriptCommand, ScriptLine};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        session,
        script,
    } = app;
    let mut runner = ScriptRunner::new(session, script);

    match run_headless(&config, &mut runner) {
        Ok(summary) => {
            let metrics = summary.final_metrics.unwrap_or_default();
            info!(
                ticks_run = summary.ticks_run,
                tps = metrics.tps,
                mean_tick_ms = metrics.mean_tick_ms,
                banked = runner.session.banked(),
                "script_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}

/// Feeds script commands into a session, one fixed step at a time.
///
/// Commands run back to back until a `wait` is reached; the wait then
/// consumes ticks until its time has elapsed.
pub(crate) struct ScriptRunner {
    session: GameSession,
    pending: VecDeque<ScriptLine>,
    wait_remaining: f32,
}

impl ScriptRunner {
    pub(crate) fn new(session: GameSession, script: Vec<ScriptLine>) -> Self {
        Self {
            session,
            pending: script.into(),
            wait_remaining: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &GameSession {
        &self.session
    }

    fn execute(&mut self, line: ScriptLine) -> Result<LoopControl, SessionError> {
        let line_number = line.line_number;
        match line.command {
            ScriptCommand::Start => {
                if !self.session.start_round() {
                    warn!(line_number, state = %self.session.round_state(), "start_ignored");
                }
            }
            ScriptCommand::Wait { seconds } => self.wait_remaining = seconds,
            ScriptCommand::Produce { count, golden } => {
                for _ in 0..count {
                    let event = ProduceEvent {
                        is_golden: golden,
                        ..ProduceEvent::default()
                    };
                    match self.session.on_produce(event) {
                        Some(outcome) => debug!(
                            eggs = outcome.eggs,
                            doubled = outcome.doubled,
                            mammal = outcome.mammal_spawn.is_some(),
                            time_extension = outcome.time_extension.unwrap_or(0.0),
                            "egg_produced"
                        ),
                        None => {
                            warn!(line_number, "produce_outside_round");
                            break;
                        }
                    }
                }
            }
            ScriptCommand::Upgrade { skill_id } => match self.session.try_upgrade(&skill_id) {
                Ok(receipt) => info!(
                    skill_id = receipt.skill_id.as_str(),
                    level = receipt.new_level,
                    cost = receipt.cost,
                    banked = self.session.banked(),
                    "upgrade_applied"
                ),
                Err(SessionError::Upgrade(reason)) => {
                    warn!(line_number, reason = %reason, "upgrade_rejected");
                }
                Err(err) => return Err(err),
            },
            ScriptCommand::End => {
                if self.session.end_round()?.is_none() {
                    warn!(line_number, "end_outside_round");
                }
            }
            ScriptCommand::Prepare => {
                self.session.return_to_preparation();
            }
            ScriptCommand::Grant { amount } => match self.session.add_banked(amount) {
                Ok(banked) => info!(amount, banked, "currency_granted"),
                Err(SessionError::Economy(reason)) => {
                    warn!(line_number, reason = %reason, "grant_rejected");
                }
                Err(err) => return Err(err),
            },
            ScriptCommand::Area => {
                self.session.advance_area();
            }
            ScriptCommand::Transition => {
                self.session.mark_transition_shown();
            }
            ScriptCommand::Status => self.log_status(),
            ScriptCommand::Skills => self.log_skills(),
            ScriptCommand::Save => self.session.suspend()?,
            ScriptCommand::Reset => self.session.reset_progress()?,
            ScriptCommand::Quit => return Ok(LoopControl::Exit),
        }
        Ok(LoopControl::Continue)
    }

    fn log_status(&self) {
        let stats = self.session.stats();
        let area = self.session.area();
        info!(
            state = %self.session.round_state(),
            remaining_time = self.session.remaining_time(),
            banked = self.session.banked(),
            session = self.session.session_currency(),
            area_level = area.current_level(),
            transition_shown = area.transition_shown(),
            attack_damage = stats.attack_damage,
            session_duration = stats.session_duration,
            max_chickens = stats.max_chickens(),
            save_pending = self.session.save_pending(),
            "status"
        );
    }

    fn log_skills(&self) {
        for def in self.session.database().skill_defs() {
            let status = match self.session.upgrade_status(&def.def_name) {
                Some(UpgradeStatus::Available { cost }) => format!("available ({cost})"),
                Some(UpgradeStatus::Unaffordable { cost }) => format!("unaffordable ({cost})"),
                Some(UpgradeStatus::Locked) => "locked".to_string(),
                Some(UpgradeStatus::Maxed) | None => "maxed".to_string(),
            };
            info!(
                skill_id = def.def_name.as_str(),
                label = def.label.as_str(),
                level = self.session.level(&def.def_name),
                max_level = def.max_level,
                status = status.as_str(),
                "skill"
            );
        }
    }
}

impl Simulation for ScriptRunner {
    type Error = SessionError;

    fn update(&mut self, fixed_dt_seconds: f32) -> Result<LoopControl, Self::Error> {
        while self.wait_remaining <= 0.0 {
            let Some(line) = self.pending.pop_front() else {
                if self.session.round_state() == RoundState::Playing {
                    info!("script_exhausted_mid_round");
                }
                return Ok(LoopControl::Exit);
            };
            if self.execute(line)? == LoopControl::Exit {
                return Ok(LoopControl::Exit);
            }
        }

        if let Some(summary) = self.session.tick(fixed_dt_seconds)? {
            info!(
                eggs_banked = summary.eggs_banked,
                duration_played = summary.duration_played,
                banked = self.session.banked(),
                "round_over"
            );
        }
        self.wait_remaining -= fixed_dt_seconds;
        Ok(LoopControl::Continue)
    }

    fn shutdown(&mut self) -> Result<(), Self::Error> {
        self.session.suspend()
    }
}
