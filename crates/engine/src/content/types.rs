use std::fmt;

/// Stat tag a skill level modifies. Tags come from content XML; anything the
/// compiler does not know is carried as `Unrecognized` so a bad tag degrades
/// to a logged no-op instead of failing startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SkillEffect {
    AttackDamage,
    AttackRadius,
    AttackSpeed,
    SessionDuration,
    MoveSpeed,
    RecoveryChance,
    UnlockMitosis,
    MitosisChance,
    MaxChickenCount,
    InitialChickenCount,
    UnlockGoldenChicken,
    GoldenChickenSpawnRate,
    GoldenEggMultiplier,
    CritChance,
    UnlockDoubleProduction,
    DoubleProductionChance,
    UnlockGravityWave,
    GravityWaveChance,
    UnlockMammal,
    MammalChance,
    Unrecognized(String),
}

impl SkillEffect {
    pub const KNOWN: [SkillEffect; 20] = [
        Self::AttackDamage,
        Self::AttackRadius,
        Self::AttackSpeed,
        Self::SessionDuration,
        Self::MoveSpeed,
        Self::RecoveryChance,
        Self::UnlockMitosis,
        Self::MitosisChance,
        Self::MaxChickenCount,
        Self::InitialChickenCount,
        Self::UnlockGoldenChicken,
        Self::GoldenChickenSpawnRate,
        Self::GoldenEggMultiplier,
        Self::CritChance,
        Self::UnlockDoubleProduction,
        Self::DoubleProductionChance,
        Self::UnlockGravityWave,
        Self::GravityWaveChance,
        Self::UnlockMammal,
        Self::MammalChance,
    ];

    pub fn from_tag(tag: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|known| known.as_tag() == tag)
            .cloned()
            .unwrap_or_else(|| Self::Unrecognized(tag.to_string()))
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::AttackDamage => "AttackDamage",
            Self::AttackRadius => "AttackRadius",
            Self::AttackSpeed => "AttackSpeed",
            Self::SessionDuration => "SessionDuration",
            Self::MoveSpeed => "MoveSpeed",
            Self::RecoveryChance => "RecoveryChance",
            Self::UnlockMitosis => "UnlockMitosis",
            Self::MitosisChance => "MitosisChance",
            Self::MaxChickenCount => "MaxChickenCount",
            Self::InitialChickenCount => "InitialChickenCount",
            Self::UnlockGoldenChicken => "UnlockGoldenChicken",
            Self::GoldenChickenSpawnRate => "GoldenChickenSpawnRate",
            Self::GoldenEggMultiplier => "GoldenEggMultiplier",
            Self::CritChance => "CritChance",
            Self::UnlockDoubleProduction => "UnlockDoubleProduction",
            Self::DoubleProductionChance => "DoubleProductionChance",
            Self::UnlockGravityWave => "UnlockGravityWave",
            Self::GravityWaveChance => "GravityWaveChance",
            Self::UnlockMammal => "UnlockMammal",
            Self::MammalChance => "MammalChance",
            Self::Unrecognized(tag) => tag.as_str(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for SkillEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Price of the upgrade that moves a skill from `level` to `level + 1`.
#[derive(Debug, Clone, PartialEq)]
pub enum CostCurve {
    Table(Vec<u64>),
    Geometric { base: u64, growth: f64 },
}

impl CostCurve {
    pub fn cost_at(&self, level: u32) -> u64 {
        match self {
            Self::Table(costs) => costs
                .get(level as usize)
                .or_else(|| costs.last())
                .copied()
                .unwrap_or(1),
            Self::Geometric { base, growth } => {
                let raw = (*base as f64) * growth.powi(level as i32);
                // `as` saturates for out-of-range floats.
                (raw.round() as u64).max(1)
            }
        }
    }
}

/// Effect strength applied for the upgrade that reaches `level + 1`.
#[derive(Debug, Clone, PartialEq)]
pub enum MagnitudeCurve {
    Table(Vec<f32>),
    Constant(f32),
}

impl MagnitudeCurve {
    pub fn magnitude_at(&self, level: u32) -> f32 {
        match self {
            Self::Table(values) => values
                .get(level as usize)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(0.0),
            Self::Constant(value) => *value,
        }
    }
}

/// Shortest pause between attacks, in seconds.
pub const MIN_ATTACK_INTERVAL: f32 = 0.1;

/// Starting point every progression fold begins from.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineStats {
    pub attack_damage: f32,
    pub attack_radius: f32,
    pub attack_interval: f32,
    pub session_duration: f32,
    pub recovery_chance: f32,
    pub mitosis_chance: f32,
    pub max_chickens: u32,
    pub initial_chickens: u32,
    pub golden_spawn_rate: f32,
    pub golden_egg_multiplier: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub double_production_chance: f32,
    pub gravity_wave_chance: f32,
    pub gravity_wave_time_extension: f32,
    pub mammal_chance: f32,
}

impl Default for BaselineStats {
    fn default() -> Self {
        Self {
            attack_damage: 10.0,
            attack_radius: 1.5,
            attack_interval: 1.0,
            session_duration: 30.0,
            recovery_chance: 0.0,
            mitosis_chance: 0.0,
            max_chickens: 10,
            initial_chickens: 3,
            golden_spawn_rate: 0.0,
            golden_egg_multiplier: 5,
            crit_chance: 0.0,
            crit_multiplier: 2.0,
            double_production_chance: 0.0,
            gravity_wave_chance: 0.0,
            gravity_wave_time_extension: 2.0,
            mammal_chance: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_tags_round_trip_for_every_known_effect() {
        for effect in SkillEffect::KNOWN {
            assert_eq!(SkillEffect::from_tag(effect.as_tag()), effect);
        }
    }

    #[test]
    fn unknown_tag_is_kept_as_unrecognized() {
        let effect = SkillEffect::from_tag("Teleport");
        assert_eq!(effect, SkillEffect::Unrecognized("Teleport".to_string()));
        assert!(!effect.is_recognized());
    }

    #[test]
    fn geometric_cost_grows_per_level() {
        let curve = CostCurve::Geometric {
            base: 10,
            growth: 2.0,
        };
        assert_eq!(curve.cost_at(0), 10);
        assert_eq!(curve.cost_at(1), 20);
        assert_eq!(curve.cost_at(3), 80);
    }

    #[test]
    fn geometric_cost_never_drops_below_one() {
        let curve = CostCurve::Geometric {
            base: 1,
            growth: 0.1,
        };
        assert_eq!(curve.cost_at(4), 1);
    }

    #[test]
    fn table_magnitude_reads_per_level_value() {
        let curve = MagnitudeCurve::Table(vec![5.0, 7.5]);
        assert_eq!(curve.magnitude_at(0), 5.0);
        assert_eq!(curve.magnitude_at(1), 7.5);
    }
}
