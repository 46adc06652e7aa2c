use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::stats::ProgressionStats;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A chicken laid an egg. `is_golden` comes from the chicken that laid it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProduceEvent {
    pub position: Position,
    pub is_golden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionOutcome {
    pub eggs: u64,
    pub doubled: bool,
    pub mammal_spawn: Option<Position>,
    pub time_extension: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackRoll {
    pub damage: f32,
    pub is_crit: bool,
}

/// Seeded random stream behind every chance stat.
#[derive(Debug, Clone)]
pub struct ProductionRolls {
    seed: u64,
    rng: ChaCha8Rng,
}

impl ProductionRolls {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Works out the eggs for one production event. Double production, mammal
    /// and gravity wave are rolled independently in that order, each only
    /// when unlocked.
    pub fn resolve(&mut self, stats: &ProgressionStats, event: &ProduceEvent) -> ProductionOutcome {
        let mut eggs = 1u64;
        if event.is_golden {
            eggs = eggs.saturating_mul(u64::from(stats.golden_egg_multiplier.max(1)));
        }

        let doubled =
            stats.double_production_unlocked && self.chance(stats.double_production_chance);
        if doubled {
            eggs = eggs.saturating_mul(2);
        }

        let mammal_spawn = (stats.mammal_unlocked && self.chance(stats.mammal_chance))
            .then_some(event.position);

        let time_extension = (stats.gravity_wave_unlocked
            && self.chance(stats.gravity_wave_chance)
            && stats.gravity_wave_time_extension > 0.0)
            .then_some(stats.gravity_wave_time_extension);

        ProductionOutcome {
            eggs,
            doubled,
            mammal_spawn,
            time_extension,
        }
    }

    pub fn roll_golden_spawn(&mut self, stats: &ProgressionStats) -> bool {
        stats.golden_unlocked && self.chance(stats.golden_spawn_rate)
    }

    pub fn roll_mitosis(&mut self, stats: &ProgressionStats) -> bool {
        stats.mitosis_unlocked && self.chance(stats.mitosis_chance)
    }

    pub fn roll_recovery(&mut self, stats: &ProgressionStats) -> bool {
        self.chance(stats.recovery_chance)
    }

    pub fn roll_attack_damage(&mut self, stats: &ProgressionStats) -> AttackRoll {
        let is_crit = self.chance(stats.crit_chance);
        let damage = if is_crit {
            stats.attack_damage * stats.crit_multiplier
        } else {
            stats.attack_damage
        };
        AttackRoll { damage, is_crit }
    }

    // Certain outcomes do not consume a draw.
    fn chance(&mut self, probability: f32) -> bool {
        if probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        self.rng.random::<f32>() < probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything_unlocked() -> ProgressionStats {
        ProgressionStats {
            double_production_unlocked: true,
            double_production_chance: 1.0,
            mammal_unlocked: true,
            mammal_chance: 1.0,
            gravity_wave_unlocked: true,
            gravity_wave_chance: 1.0,
            ..ProgressionStats::default()
        }
    }

    #[test]
    fn plain_egg_is_worth_one() {
        let mut rolls = ProductionRolls::new(7);
        let outcome = rolls.resolve(&ProgressionStats::default(), &ProduceEvent::default());
        assert_eq!(
            outcome,
            ProductionOutcome {
                eggs: 1,
                doubled: false,
                mammal_spawn: None,
                time_extension: None,
            }
        );
    }

    #[test]
    fn golden_flag_applies_multiplier() {
        let mut rolls = ProductionRolls::new(7);
        let event = ProduceEvent {
            is_golden: true,
            ..ProduceEvent::default()
        };
        assert_eq!(rolls.resolve(&ProgressionStats::default(), &event).eggs, 5);
    }

    #[test]
    fn certain_rolls_fire_every_bonus() {
        let mut rolls = ProductionRolls::new(7);
        let event = ProduceEvent {
            position: Position { x: 2.0, y: -1.0 },
            is_golden: true,
        };
        let outcome = rolls.resolve(&everything_unlocked(), &event);
        assert_eq!(outcome.eggs, 10);
        assert!(outcome.doubled);
        assert_eq!(outcome.mammal_spawn, Some(event.position));
        assert_eq!(outcome.time_extension, Some(2.0));
    }

    #[test]
    fn locked_bonuses_never_fire_even_with_chance() {
        let stats = ProgressionStats {
            double_production_chance: 1.0,
            mammal_chance: 1.0,
            gravity_wave_chance: 1.0,
            ..ProgressionStats::default()
        };
        let mut rolls = ProductionRolls::new(7);
        let outcome = rolls.resolve(&stats, &ProduceEvent::default());
        assert_eq!(outcome.eggs, 1);
        assert!(outcome.mammal_spawn.is_none());
        assert!(outcome.time_extension.is_none());
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let stats = ProgressionStats {
            double_production_unlocked: true,
            double_production_chance: 0.5,
            mammal_unlocked: true,
            mammal_chance: 0.5,
            ..ProgressionStats::default()
        };
        let mut a = ProductionRolls::new(42);
        let mut b = ProductionRolls::new(42);
        for _ in 0..50 {
            let event = ProduceEvent::default();
            assert_eq!(a.resolve(&stats, &event), b.resolve(&stats, &event));
        }
    }

    #[test]
    fn half_chance_lands_near_half() {
        let stats = ProgressionStats {
            double_production_unlocked: true,
            double_production_chance: 0.5,
            ..ProgressionStats::default()
        };
        let mut rolls = ProductionRolls::new(3);
        let doubled = (0..2_000)
            .filter(|_| rolls.resolve(&stats, &ProduceEvent::default()).doubled)
            .count();
        assert!((800..1_200).contains(&doubled), "doubled {doubled} of 2000");
    }

    #[test]
    fn crit_multiplies_damage() {
        let stats = ProgressionStats {
            crit_chance: 1.0,
            ..ProgressionStats::default()
        };
        let mut rolls = ProductionRolls::new(1);
        assert_eq!(
            rolls.roll_attack_damage(&stats),
            AttackRoll {
                damage: 20.0,
                is_crit: true
            }
        );
        assert!(!rolls.roll_golden_spawn(&stats));
        assert!(!rolls.roll_mitosis(&stats));
        assert!(!rolls.roll_recovery(&stats));
    }
}
