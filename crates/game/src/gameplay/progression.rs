use std::collections::BTreeMap;

use henhouse_engine::{SkillDatabase, SkillDef};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::economy::EconomyError;
use super::stats::{apply_effect, ProgressionStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevelRecord {
    pub id: String,
    #[serde(default)]
    pub level: u32,
}

impl SkillLevelRecord {
    pub fn new(id: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.into(),
            level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpgradeError {
    #[error("unknown skill id '{0}'")]
    UnknownSkillId(String),
    #[error("skill '{skill_id}' is already at max level {max_level}")]
    AlreadyMaxLevel { skill_id: String, max_level: u32 },
    #[error("skill '{skill_id}' requires '{prerequisite}' first")]
    PrerequisiteLocked {
        skill_id: String,
        prerequisite: String,
    },
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("upgrade cost must be positive")]
    InvalidAmount,
}

impl From<EconomyError> for UpgradeError {
    fn from(error: EconomyError) -> Self {
        match error {
            EconomyError::InvalidAmount => Self::InvalidAmount,
            EconomyError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStatus {
    Available { cost: u64 },
    Unaffordable { cost: u64 },
    Locked,
    Maxed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReceipt {
    pub skill_id: String,
    pub new_level: u32,
    pub cost: u64,
}

/// Derived stats plus the skill level map they are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionState {
    stats: ProgressionStats,
    levels: BTreeMap<String, u32>,
}

impl ProgressionState {
    pub fn new(database: &SkillDatabase) -> Self {
        Self {
            stats: ProgressionStats::from_baseline(database.baseline()),
            levels: BTreeMap::new(),
        }
    }

    pub fn from_records<I>(database: &SkillDatabase, records: I) -> Self
    where
        I: IntoIterator<Item = SkillLevelRecord>,
    {
        let mut state = Self::new(database);
        state.rebuild_from_records(database, records);
        state
    }

    /// Resets to the baseline and replays every level in prerequisite order,
    /// one applicator call per level.
    pub fn rebuild_from_records<I>(&mut self, database: &SkillDatabase, records: I)
    where
        I: IntoIterator<Item = SkillLevelRecord>,
    {
        self.levels.clear();
        for record in records {
            if record.level == 0 {
                continue;
            }
            let Some(def) = database.skill_def_by_name(&record.id) else {
                warn!(
                    skill_id = record.id.as_str(),
                    level = record.level,
                    "unknown_skill_id_skipped"
                );
                continue;
            };
            let level = if record.level > def.max_level {
                warn!(
                    skill_id = record.id.as_str(),
                    level = record.level,
                    max_level = def.max_level,
                    "skill_level_clamped_to_max"
                );
                def.max_level
            } else {
                record.level
            };
            let entry = self.levels.entry(record.id).or_insert(0);
            *entry = (*entry).max(level);
        }

        self.stats = ProgressionStats::from_baseline(database.baseline());
        for def in database.application_order() {
            let level = self.level(&def.def_name);
            for level_index in 0..level {
                apply_effect(
                    &mut self.stats,
                    &def.effect,
                    def.magnitude_for_level(level_index),
                );
            }
        }
    }

    pub fn reset(&mut self, database: &SkillDatabase) {
        self.rebuild_from_records(database, std::iter::empty());
    }

    /// Buys exactly one level of `skill_id`. `pay` is only invoked once every
    /// other check has passed; the level changes only if it succeeds.
    pub fn try_upgrade<F>(
        &mut self,
        database: &SkillDatabase,
        skill_id: &str,
        pay: F,
    ) -> Result<UpgradeReceipt, UpgradeError>
    where
        F: FnOnce(u64) -> Result<u64, EconomyError>,
    {
        let def = database
            .skill_def_by_name(skill_id)
            .ok_or_else(|| UpgradeError::UnknownSkillId(skill_id.to_string()))?;
        let current = self.level(skill_id);
        let cost = def
            .cost_for_level(current)
            .ok_or_else(|| UpgradeError::AlreadyMaxLevel {
                skill_id: skill_id.to_string(),
                max_level: def.max_level,
            })?;
        if current == 0 {
            self.check_prerequisite(database, def)?;
        }

        pay(cost)?;

        apply_effect(&mut self.stats, &def.effect, def.magnitude_for_level(current));
        let new_level = current + 1;
        self.levels.insert(skill_id.to_string(), new_level);
        info!(skill_id, new_level, cost, "skill_upgraded");
        Ok(UpgradeReceipt {
            skill_id: skill_id.to_string(),
            new_level,
            cost,
        })
    }

    fn check_prerequisite(
        &self,
        database: &SkillDatabase,
        def: &SkillDef,
    ) -> Result<(), UpgradeError> {
        match database.prerequisite_of(def) {
            Some(prerequisite) if self.level(&prerequisite.def_name) == 0 => {
                Err(UpgradeError::PrerequisiteLocked {
                    skill_id: def.def_name.clone(),
                    prerequisite: prerequisite.def_name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn stats(&self) -> &ProgressionStats {
        &self.stats
    }

    pub fn level(&self, skill_id: &str) -> u32 {
        self.levels.get(skill_id).copied().unwrap_or(0)
    }

    pub fn next_cost(&self, database: &SkillDatabase, skill_id: &str) -> Option<u64> {
        database
            .skill_def_by_name(skill_id)
            .and_then(|def| def.cost_for_level(self.level(skill_id)))
    }

    pub fn upgrade_status(
        &self,
        database: &SkillDatabase,
        skill_id: &str,
        banked: u64,
    ) -> Option<UpgradeStatus> {
        let def = database.skill_def_by_name(skill_id)?;
        let current = self.level(skill_id);
        let Some(cost) = def.cost_for_level(current) else {
            return Some(UpgradeStatus::Maxed);
        };
        if current == 0 && self.check_prerequisite(database, def).is_err() {
            return Some(UpgradeStatus::Locked);
        }
        Some(if banked >= cost {
            UpgradeStatus::Available { cost }
        } else {
            UpgradeStatus::Unaffordable { cost }
        })
    }

    /// Unlocked skills only, sorted by id.
    pub fn records(&self) -> Vec<SkillLevelRecord> {
        self.levels
            .iter()
            .filter(|(_, level)| **level > 0)
            .map(|(id, level)| SkillLevelRecord::new(id.clone(), *level))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use henhouse_engine::compile_skill_database_from_str;

    use super::*;
    use crate::gameplay::economy::EconomyState;

    const TREE: &str = r#"<Defs>
        <SkillDef>
            <defName>dmg1</defName><label>Sharp Beaks</label><effect>AttackDamage</effect>
            <maxLevel>3</maxLevel><costs>10,20,40</costs><magnitude>5</magnitude>
        </SkillDef>
        <SkillDef>
            <defName>dmg2</defName><label>Iron Beaks</label><effect>AttackDamage</effect>
            <maxLevel>2</maxLevel><costs>50,100</costs><magnitudes>2.5,7.5</magnitudes>
            <prerequisite>dmg1</prerequisite>
        </SkillDef>
        <SkillDef>
            <defName>mammal</defName><label>Odd Hatchling</label><effect>UnlockMammal</effect>
            <baseCost>200</baseCost><magnitude>1</magnitude>
            <prerequisite>dmg2</prerequisite>
        </SkillDef>
        <SkillDef>
            <defName>mammal_chance</defName><label>More Oddities</label><effect>MammalChance</effect>
            <maxLevel>4</maxLevel><baseCost>25</baseCost><costGrowth>2</costGrowth><magnitude>0.25</magnitude>
            <prerequisite>mammal</prerequisite>
        </SkillDef>
        <SkillDef>
            <defName>speed</defName><label>Quick Pecks</label><effect>AttackSpeed</effect>
            <maxLevel>5</maxLevel><baseCost>15</baseCost><magnitude>-0.25</magnitude>
        </SkillDef>
        <SkillDef>
            <defName>coop</defName><label>Bigger Coop</label><effect>MaxChickenCount</effect>
            <maxLevel>3</maxLevel><baseCost>30</baseCost><costGrowth>1.5</costGrowth><magnitude>1</magnitude>
        </SkillDef>
    </Defs>"#;

    fn database() -> SkillDatabase {
        compile_skill_database_from_str("tree.xml", TREE).expect("tree")
    }

    fn free(_: u64) -> Result<u64, EconomyError> {
        Ok(0)
    }

    #[test]
    fn two_damage_levels_add_ten() {
        let db = database();
        let mut state = ProgressionState::new(&db);
        state.try_upgrade(&db, "dmg1", free).expect("level 1");
        state.try_upgrade(&db, "dmg1", free).expect("level 2");
        assert_eq!(state.stats().attack_damage, 20.0);
        assert_eq!(state.level("dmg1"), 2);
    }

    #[test]
    fn upgrade_spends_current_level_cost() {
        let db = database();
        let mut state = ProgressionState::new(&db);
        let mut economy = EconomyState::with_banked(100);

        let first = state
            .try_upgrade(&db, "dmg1", |cost| economy.spend(cost))
            .expect("first");
        let second = state
            .try_upgrade(&db, "dmg1", |cost| economy.spend(cost))
            .expect("second");
        assert_eq!((first.cost, second.cost), (10, 20));
        assert_eq!(economy.banked(), 70);
    }

    #[test]
    fn insufficient_funds_leaves_level_and_stats() {
        let db = database();
        let mut state = ProgressionState::new(&db);
        let mut economy = EconomyState::with_banked(5);
        let err = state
            .try_upgrade(&db, "dmg1", |cost| economy.spend(cost))
            .expect_err("too poor");
        assert_eq!(
            err,
            UpgradeError::InsufficientFunds {
                required: 10,
                available: 5
            }
        );
        assert_eq!(state.level("dmg1"), 0);
        assert_eq!(state.stats(), ProgressionState::new(&db).stats());
        assert_eq!(economy.banked(), 5);
    }

    #[test]
    fn max_level_is_enforced_without_paying() {
        let db = database();
        let mut state = ProgressionState::from_records(&db, [SkillLevelRecord::new("dmg1", 3)]);
        let mut paid = false;
        let err = state
            .try_upgrade(&db, "dmg1", |_| {
                paid = true;
                Ok(0)
            })
            .expect_err("maxed");
        assert!(matches!(err, UpgradeError::AlreadyMaxLevel { max_level: 3, .. }));
        assert!(!paid);
    }

    #[test]
    fn prerequisite_gates_only_first_unlock() {
        let db = database();
        let mut state = ProgressionState::new(&db);
        let err = state.try_upgrade(&db, "dmg2", free).expect_err("locked");
        assert_eq!(
            err,
            UpgradeError::PrerequisiteLocked {
                skill_id: "dmg2".to_string(),
                prerequisite: "dmg1".to_string()
            }
        );

        state.try_upgrade(&db, "dmg1", free).expect("dmg1");
        state.try_upgrade(&db, "dmg2", free).expect("dmg2 level 1");
        // A save edited to drop dmg1 must not block further dmg2 levels.
        let mut records = state.records();
        records.retain(|record| record.id != "dmg1");
        let mut reloaded = ProgressionState::from_records(&db, records);
        reloaded.try_upgrade(&db, "dmg2", free).expect("dmg2 level 2");
        assert_eq!(reloaded.level("dmg2"), 2);
    }

    #[test]
    fn unknown_skill_is_rejected() {
        let db = database();
        let mut state = ProgressionState::new(&db);
        assert_eq!(
            state.try_upgrade(&db, "ghost", free),
            Err(UpgradeError::UnknownSkillId("ghost".to_string()))
        );
    }

    #[test]
    fn per_level_magnitudes_are_applied_individually() {
        let db = database();
        let state = ProgressionState::from_records(
            &db,
            [SkillLevelRecord::new("dmg1", 1), SkillLevelRecord::new("dmg2", 2)],
        );
        assert_eq!(state.stats().attack_damage, 10.0 + 5.0 + 2.5 + 7.5);
    }

    #[test]
    fn rebuild_skips_unknown_clamps_and_drops_zero() {
        let db = database();
        let state = ProgressionState::from_records(
            &db,
            [
                SkillLevelRecord::new("ghost", 2),
                SkillLevelRecord::new("dmg1", 9),
                SkillLevelRecord::new("coop", 0),
            ],
        );
        assert_eq!(state.records(), vec![SkillLevelRecord::new("dmg1", 3)]);
        assert_eq!(state.stats().attack_damage, 25.0);
    }

    #[test]
    fn rebuild_is_idempotent_and_order_independent() {
        let db = database();
        let records = vec![
            SkillLevelRecord::new("mammal_chance", 2),
            SkillLevelRecord::new("mammal", 1),
            SkillLevelRecord::new("dmg1", 1),
            SkillLevelRecord::new("dmg2", 1),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let mut state = ProgressionState::from_records(&db, records.clone());
        let first = state.clone();
        state.rebuild_from_records(&db, records);
        assert_eq!(state, first);
        assert_eq!(ProgressionState::from_records(&db, reversed), first);
        assert!(first.stats().mammal_unlocked);
        assert!((first.stats().mammal_chance - 0.51).abs() < 1e-6);
    }

    #[test]
    fn upgrade_status_reports_each_state() {
        let db = database();
        let state = ProgressionState::from_records(&db, [SkillLevelRecord::new("dmg1", 3)]);
        assert_eq!(state.upgrade_status(&db, "dmg1", 0), Some(UpgradeStatus::Maxed));
        assert_eq!(
            state.upgrade_status(&db, "dmg2", 10),
            Some(UpgradeStatus::Unaffordable { cost: 50 })
        );
        assert_eq!(
            state.upgrade_status(&db, "dmg2", 50),
            Some(UpgradeStatus::Available { cost: 50 })
        );
        assert_eq!(state.upgrade_status(&db, "mammal", 1_000), Some(UpgradeStatus::Locked));
        assert_eq!(state.upgrade_status(&db, "ghost", 0), None);
        assert_eq!(state.next_cost(&db, "coop"), Some(30));
        assert_eq!(state.next_cost(&db, "dmg1"), None);
    }

    #[test]
    fn reset_returns_to_baseline() {
        let db = database();
        let mut state = ProgressionState::from_records(&db, [SkillLevelRecord::new("speed", 2)]);
        assert_eq!(state.stats().attack_interval, 0.5);
        state.reset(&db);
        assert_eq!(state, ProgressionState::new(&db));
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn prop_incremental_upgrades_match_rebuild(picks in prop::collection::vec(0..6usize, 0..40)) {
                let db = database();
                let ids = ["dmg1", "dmg2", "mammal", "mammal_chance", "speed", "coop"];
                let mut state = ProgressionState::new(&db);
                for pick in picks {
                    let _ = state.try_upgrade(&db, ids[pick], free);
                }

                let rebuilt = ProgressionState::from_records(&db, state.records());
                prop_assert_eq!(rebuilt.records(), state.records());
                prop_assert_eq!(rebuilt.stats(), state.stats());
            }
        }
    }
}
