use std::time::Duration;

use chrono::Utc;
use henhouse_engine::{SkillDatabase, StorageBackend, StorageError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::area::AreaProgress;
use super::economy::{EconomyError, EconomyState};
use super::persistence::{decode, encode, SaveError, SaveRecord};
use super::production::{ProduceEvent, ProductionOutcome, ProductionRolls};
use super::progression::{ProgressionState, UpgradeError, UpgradeReceipt, UpgradeStatus};
use super::round::{
    ActorLayer, ListenerId, RoundController, RoundEvent, RoundState, RoundSummary,
};
use super::save_scheduler::SaveScheduler;
use super::stats::ProgressionStats;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Upgrade(#[from] UpgradeError),
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub save_key: String,
    pub save_debounce: Duration,
    pub seed: u64,
}

/// Owns every piece of run state and decides when it is written out.
///
/// Spending and banking save synchronously. Other banked credits and area
/// changes go through the debounced scheduler, which `tick` advances and
/// `suspend` flushes. Write failures are returned; nothing else is fatal.
pub struct GameSession {
    database: SkillDatabase,
    progression: ProgressionState,
    economy: EconomyState,
    area: AreaProgress,
    round: RoundController,
    rolls: ProductionRolls,
    storage: Box<dyn StorageBackend>,
    save_key: String,
    scheduler: SaveScheduler,
}

impl GameSession {
    /// Reads the save slot and rebuilds all state from it. A slot that is
    /// missing, unreadable or corrupt starts a fresh game.
    pub fn load(
        database: SkillDatabase,
        storage: Box<dyn StorageBackend>,
        options: SessionOptions,
    ) -> Self {
        let bytes = match storage.read(&options.save_key) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(key = options.save_key.as_str(), error = %error, "save_read_failed_starting_fresh");
                None
            }
        };
        let record = decode(bytes.as_deref());
        Self::from_record(database, storage, options, record)
    }

    fn from_record(
        database: SkillDatabase,
        storage: Box<dyn StorageBackend>,
        options: SessionOptions,
        record: SaveRecord,
    ) -> Self {
        let progression = ProgressionState::from_records(&database, record.skill_records.clone());
        let session = Self {
            economy: record.economy(),
            area: record.area(),
            progression,
            round: RoundController::new(),
            rolls: ProductionRolls::new(options.seed),
            storage,
            save_key: options.save_key,
            scheduler: SaveScheduler::new(options.save_debounce),
            database,
        };
        info!(
            banked = session.economy.banked(),
            unlocked_skills = record.skill_records.len(),
            area_level = session.area.current_level(),
            last_save_time = record.last_save_time.as_str(),
            seed = session.rolls.seed(),
            "session_loaded"
        );
        session
    }

    pub fn set_actor_layer(&mut self, actors: Box<dyn ActorLayer>) {
        self.round.set_actor_layer(actors);
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&RoundEvent, &EconomyState) + 'static,
    {
        self.round.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.round.unsubscribe(id)
    }

    pub fn start_round(&mut self) -> bool {
        self.round
            .start_round(&mut self.economy, self.progression.stats())
    }

    pub fn end_round(&mut self) -> Result<Option<RoundSummary>, SessionError> {
        let summary = self.round.end_round(&mut self.economy);
        if summary.is_some() {
            self.save_now()?;
        }
        Ok(summary)
    }

    pub fn return_to_preparation(&mut self) -> bool {
        self.round.return_to_preparation(&self.economy)
    }

    /// One fixed step: round timer first, then the debounced save.
    pub fn tick(&mut self, dt_seconds: f32) -> Result<Option<RoundSummary>, SessionError> {
        let summary = self.round.tick(dt_seconds, &mut self.economy);
        if summary.is_some() {
            self.save_now()?;
        }

        let dt = Duration::try_from_secs_f32(dt_seconds.max(0.0)).unwrap_or(Duration::ZERO);
        if self.scheduler.advance(dt) {
            if let Err(error) = self.write_save() {
                self.scheduler.request();
                return Err(error.into());
            }
        }
        Ok(summary)
    }

    /// Credits the eggs of one production event. Ignored outside a round.
    pub fn on_produce(&mut self, event: ProduceEvent) -> Option<ProductionOutcome> {
        if self.round.state() != RoundState::Playing {
            debug!(state = %self.round.state(), "produce_ignored");
            return None;
        }
        let outcome = self.rolls.resolve(self.progression.stats(), &event);
        if let Err(error) = self.economy.add_session_eggs(outcome.eggs) {
            warn!(error = %error, "produce_credit_failed");
        }
        if let Some(extension) = outcome.time_extension {
            if let Err(error) = self.round.extend_time(extension, &self.economy) {
                warn!(error = %error, "gravity_wave_extend_failed");
            }
        }
        Some(outcome)
    }

    pub fn try_upgrade(&mut self, skill_id: &str) -> Result<UpgradeReceipt, SessionError> {
        let economy = &mut self.economy;
        let receipt = self
            .progression
            .try_upgrade(&self.database, skill_id, |cost| economy.spend(cost))?;
        self.save_now()?;
        Ok(receipt)
    }

    /// Banked credit from anywhere other than a finished round.
    pub fn add_banked(&mut self, amount: u64) -> Result<u64, SessionError> {
        let banked = self.economy.add_banked(amount)?;
        self.scheduler.request();
        Ok(banked)
    }

    pub fn advance_area(&mut self) -> u32 {
        let level = self.area.advance();
        info!(area_level = level, "area_advanced");
        self.scheduler.request();
        level
    }

    pub fn mark_transition_shown(&mut self) -> bool {
        let changed = self.area.mark_transition_shown();
        if changed {
            self.scheduler.request();
        }
        changed
    }

    /// Writes any debounced save right away.
    pub fn suspend(&mut self) -> Result<(), SessionError> {
        if self.scheduler.take_pending() {
            info!("save_flushed_on_suspend");
            if let Err(error) = self.write_save() {
                self.scheduler.request();
                return Err(error.into());
            }
        }
        Ok(())
    }

    /// Starts a new game: deletes the save slot and resets everything.
    pub fn reset_progress(&mut self) -> Result<(), SessionError> {
        self.round.return_to_preparation(&self.economy);
        self.storage
            .delete(&self.save_key)
            .map_err(|source| self.storage_error(source))?;
        self.economy = EconomyState::default();
        self.area = AreaProgress::default();
        self.progression.reset(&self.database);
        self.scheduler.clear();
        info!(key = self.save_key.as_str(), "progress_reset");
        Ok(())
    }

    pub fn database(&self) -> &SkillDatabase {
        &self.database
    }

    pub fn stats(&self) -> &ProgressionStats {
        self.progression.stats()
    }

    pub fn progression(&self) -> &ProgressionState {
        &self.progression
    }

    pub fn banked(&self) -> u64 {
        self.economy.banked()
    }

    pub fn session_currency(&self) -> u64 {
        self.economy.session()
    }

    pub fn round_state(&self) -> RoundState {
        self.round.state()
    }

    pub fn remaining_time(&self) -> f32 {
        self.round.remaining_time()
    }

    pub fn area(&self) -> AreaProgress {
        self.area
    }

    pub fn level(&self, skill_id: &str) -> u32 {
        self.progression.level(skill_id)
    }

    pub fn next_cost(&self, skill_id: &str) -> Option<u64> {
        self.progression.next_cost(&self.database, skill_id)
    }

    pub fn upgrade_status(&self, skill_id: &str) -> Option<UpgradeStatus> {
        self.progression
            .upgrade_status(&self.database, skill_id, self.economy.banked())
    }

    pub fn save_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn rolls_mut(&mut self) -> &mut ProductionRolls {
        &mut self.rolls
    }

    pub fn snapshot(&self) -> SaveRecord {
        encode(&self.economy, &self.progression, &self.area, Utc::now())
    }

    // A synchronous save also covers whatever the scheduler was waiting on.
    // On failure the state stays queued so `tick` or `suspend` retries it.
    fn save_now(&mut self) -> Result<(), SaveError> {
        self.scheduler.clear();
        let result = self.write_save();
        if result.is_err() {
            self.scheduler.request();
        }
        result
    }

    fn write_save(&mut self) -> Result<(), SaveError> {
        let record = self.snapshot();
        let bytes = record.to_json_bytes()?;
        self.storage
            .write(&self.save_key, &bytes)
            .map_err(|source| SaveError::Storage {
                key: self.save_key.clone(),
                source,
            })?;
        debug!(
            key = self.save_key.as_str(),
            banked = record.banked_currency,
            byte_count = bytes.len(),
            "save_written"
        );
        Ok(())
    }

    fn storage_error(&self, source: StorageError) -> SessionError {
        SessionError::Save(SaveError::Storage {
            key: self.save_key.clone(),
            source,
        })
    }
}
