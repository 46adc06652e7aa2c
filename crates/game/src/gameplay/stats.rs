pub use henhouse_engine::MIN_ATTACK_INTERVAL;
use henhouse_engine::{BaselineStats, SkillEffect};
use tracing::{debug, warn};

pub const MITOSIS_UNLOCK_FLOOR: f32 = 0.05;
pub const GOLDEN_UNLOCK_FLOOR: f32 = 0.05;
pub const DOUBLE_PRODUCTION_UNLOCK_FLOOR: f32 = 0.05;
pub const GRAVITY_WAVE_UNLOCK_FLOOR: f32 = 0.02;
pub const MAMMAL_UNLOCK_FLOOR: f32 = 0.01;

/// Player-facing stats, always a fold of skill levels over a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionStats {
    pub attack_damage: f32,
    pub attack_radius: f32,
    pub attack_interval: f32,
    pub session_duration: f32,
    pub recovery_chance: f32,
    pub mitosis_unlocked: bool,
    pub mitosis_chance: f32,
    pub base_max_chickens: u32,
    pub extra_max_chickens: u32,
    pub base_initial_chickens: u32,
    pub extra_initial_chickens: u32,
    pub golden_unlocked: bool,
    pub golden_spawn_rate: f32,
    pub golden_egg_multiplier: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub double_production_unlocked: bool,
    pub double_production_chance: f32,
    pub gravity_wave_unlocked: bool,
    pub gravity_wave_chance: f32,
    pub gravity_wave_time_extension: f32,
    pub mammal_unlocked: bool,
    pub mammal_chance: f32,
}

impl ProgressionStats {
    pub fn from_baseline(baseline: &BaselineStats) -> Self {
        Self {
            attack_damage: baseline.attack_damage,
            attack_radius: baseline.attack_radius,
            attack_interval: baseline.attack_interval.max(MIN_ATTACK_INTERVAL),
            session_duration: baseline.session_duration,
            recovery_chance: baseline.recovery_chance,
            mitosis_unlocked: false,
            mitosis_chance: baseline.mitosis_chance,
            base_max_chickens: baseline.max_chickens,
            extra_max_chickens: 0,
            base_initial_chickens: baseline.initial_chickens,
            extra_initial_chickens: 0,
            golden_unlocked: false,
            golden_spawn_rate: baseline.golden_spawn_rate,
            golden_egg_multiplier: baseline.golden_egg_multiplier,
            crit_chance: baseline.crit_chance,
            crit_multiplier: baseline.crit_multiplier,
            double_production_unlocked: false,
            double_production_chance: baseline.double_production_chance,
            gravity_wave_unlocked: false,
            gravity_wave_chance: baseline.gravity_wave_chance,
            gravity_wave_time_extension: baseline.gravity_wave_time_extension,
            mammal_unlocked: false,
            mammal_chance: baseline.mammal_chance,
        }
    }

    pub fn max_chickens(&self) -> u32 {
        self.base_max_chickens.saturating_add(self.extra_max_chickens)
    }

    /// Chickens placed at round start, never more than the cap.
    pub fn initial_chickens(&self) -> u32 {
        self.base_initial_chickens
            .saturating_add(self.extra_initial_chickens)
            .min(self.max_chickens())
    }
}

impl Default for ProgressionStats {
    fn default() -> Self {
        Self::from_baseline(&BaselineStats::default())
    }
}

/// Applies one skill level worth of `effect` to `stats`.
///
/// Every field an effect touches belongs to that effect alone, so levels of
/// different skills commute. Unlock effects seed their chance field only
/// while it is still at or below zero, which keeps replays from re-seeding.
pub fn apply_effect(stats: &mut ProgressionStats, effect: &SkillEffect, magnitude: f32) {
    match effect {
        SkillEffect::AttackDamage => stats.attack_damage += magnitude,
        SkillEffect::AttackRadius => stats.attack_radius += magnitude,
        SkillEffect::SessionDuration => stats.session_duration += magnitude,
        SkillEffect::AttackSpeed => {
            stats.attack_interval = (stats.attack_interval + magnitude).max(MIN_ATTACK_INTERVAL)
        }
        SkillEffect::RecoveryChance => add_chance(&mut stats.recovery_chance, magnitude),
        SkillEffect::MitosisChance => add_chance(&mut stats.mitosis_chance, magnitude),
        SkillEffect::GoldenChickenSpawnRate => add_chance(&mut stats.golden_spawn_rate, magnitude),
        SkillEffect::CritChance => add_chance(&mut stats.crit_chance, magnitude),
        SkillEffect::DoubleProductionChance => {
            add_chance(&mut stats.double_production_chance, magnitude)
        }
        SkillEffect::GravityWaveChance => add_chance(&mut stats.gravity_wave_chance, magnitude),
        SkillEffect::MammalChance => add_chance(&mut stats.mammal_chance, magnitude),
        SkillEffect::MaxChickenCount => add_count(&mut stats.extra_max_chickens, magnitude),
        SkillEffect::InitialChickenCount => add_count(&mut stats.extra_initial_chickens, magnitude),
        SkillEffect::GoldenEggMultiplier => add_count(&mut stats.golden_egg_multiplier, magnitude),
        SkillEffect::UnlockMitosis => unlock(
            &mut stats.mitosis_unlocked,
            &mut stats.mitosis_chance,
            MITOSIS_UNLOCK_FLOOR,
        ),
        SkillEffect::UnlockGoldenChicken => unlock(
            &mut stats.golden_unlocked,
            &mut stats.golden_spawn_rate,
            GOLDEN_UNLOCK_FLOOR,
        ),
        SkillEffect::UnlockDoubleProduction => unlock(
            &mut stats.double_production_unlocked,
            &mut stats.double_production_chance,
            DOUBLE_PRODUCTION_UNLOCK_FLOOR,
        ),
        SkillEffect::UnlockGravityWave => unlock(
            &mut stats.gravity_wave_unlocked,
            &mut stats.gravity_wave_chance,
            GRAVITY_WAVE_UNLOCK_FLOOR,
        ),
        SkillEffect::UnlockMammal => unlock(
            &mut stats.mammal_unlocked,
            &mut stats.mammal_chance,
            MAMMAL_UNLOCK_FLOOR,
        ),
        SkillEffect::MoveSpeed => debug!(magnitude, "move_speed_effect_reserved"),
        SkillEffect::Unrecognized(tag) => {
            warn!(effect = tag.as_str(), magnitude, "unrecognized_effect_skipped")
        }
    }
}

fn add_chance(field: &mut f32, magnitude: f32) {
    *field = (*field + magnitude).clamp(0.0, 1.0);
}

fn add_count(field: &mut u32, magnitude: f32) {
    *field = field.saturating_add_signed(magnitude.round() as i32);
}

fn unlock(flag: &mut bool, chance: &mut f32, floor: f32) {
    *flag = true;
    if *chance <= 0.0 {
        *chance = floor;
    }
}
