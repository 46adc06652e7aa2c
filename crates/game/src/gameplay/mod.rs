mod area;
mod economy;
mod persistence;
mod production;
mod progression;
mod round;
mod save_scheduler;
mod session;
mod stats;

pub use area::AreaProgress;
pub use economy::{EconomyError, EconomyState};
pub use persistence::{decode, encode, SaveError, SaveRecord, SAVE_VERSION};
pub use production::{AttackRoll, Position, ProduceEvent, ProductionOutcome, ProductionRolls};
pub use progression::{
    ProgressionState, SkillLevelRecord, UpgradeError, UpgradeReceipt, UpgradeStatus,
};
pub use round::{
    ActorLayer, ListenerId, RoundController, RoundError, RoundEvent, RoundSetup, RoundState,
    RoundSummary,
};
pub use save_scheduler::SaveScheduler;
pub use session::{GameSession, SessionError, SessionOptions};
pub use stats::{apply_effect, ProgressionStats, MIN_ATTACK_INTERVAL};
