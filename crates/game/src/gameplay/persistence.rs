use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use henhouse_engine::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::area::AreaProgress;
use super::economy::EconomyState;
use super::progression::{ProgressionState, SkillLevelRecord};

pub const SAVE_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to encode save record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write save '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },
}

/// Everything that survives a restart, written wholesale on every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub save_version: u32,
    pub banked_currency: u64,
    pub skill_records: Vec<SkillLevelRecord>,
    pub current_area_level: u32,
    pub transition_shown: bool,
    pub last_save_time: String,
}

impl SaveRecord {
    pub fn fresh() -> Self {
        Self {
            save_version: SAVE_VERSION,
            ..Self::default()
        }
    }

    pub fn area(&self) -> AreaProgress {
        AreaProgress::new(self.current_area_level, self.transition_shown)
    }

    pub fn economy(&self) -> EconomyState {
        EconomyState::with_banked(self.banked_currency)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, SaveError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

// Every field is optional on disk; older files simply lack the newer ones.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredSaveRecord {
    save_version: u32,
    banked_currency: u64,
    skill_records: Option<Vec<SkillLevelRecord>>,
    #[serde(alias = "unlockedSkills")]
    unlocked_skill_ids: Vec<String>,
    current_area_level: u32,
    transition_shown: bool,
    last_save_time: Option<String>,
}

pub fn encode(
    economy: &EconomyState,
    progression: &ProgressionState,
    area: &AreaProgress,
    now: DateTime<Utc>,
) -> SaveRecord {
    SaveRecord {
        save_version: SAVE_VERSION,
        banked_currency: economy.banked(),
        skill_records: progression.records(),
        current_area_level: area.current_level(),
        transition_shown: area.transition_shown(),
        last_save_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Never fails: a missing or unreadable save becomes a fresh record.
pub fn decode(bytes: Option<&[u8]>) -> SaveRecord {
    let Some(bytes) = bytes else {
        debug!("save_missing_starting_fresh");
        return SaveRecord::fresh();
    };

    let stored = match parse_stored_record(bytes) {
        Ok(stored) => stored,
        Err(reason) => {
            warn!(reason = reason.as_str(), "save_corrupt_recovered");
            return SaveRecord::fresh();
        }
    };

    if stored.save_version > SAVE_VERSION {
        warn!(
            save_version = stored.save_version,
            supported = SAVE_VERSION,
            "save_version_newer_than_supported"
        );
    }
    normalize(stored)
}

fn parse_stored_record(bytes: &[u8]) -> Result<StoredSaveRecord, String> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let stored = serde_path_to_error::deserialize::<_, StoredSaveRecord>(&mut deserializer)
        .map_err(|error| {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                format!("parse save json: {source}")
            } else {
                format!("parse save json at {path}: {source}")
            }
        })?;
    deserializer
        .end()
        .map_err(|error| format!("parse save json: {error}"))?;
    Ok(stored)
}

fn normalize(stored: StoredSaveRecord) -> SaveRecord {
    let mut levels = BTreeMap::<String, u32>::new();
    for record in stored.skill_records.unwrap_or_default() {
        if record.level == 0 {
            continue;
        }
        let entry = levels.entry(record.id).or_insert(0);
        *entry = (*entry).max(record.level);
    }

    let mut migrated = 0usize;
    for id in stored.unlocked_skill_ids {
        if !id.is_empty() && !levels.contains_key(&id) {
            levels.insert(id, 1);
            migrated += 1;
        }
    }
    if migrated > 0 {
        debug!(migrated, "legacy_unlocked_skills_migrated");
    }

    SaveRecord {
        save_version: SAVE_VERSION,
        banked_currency: stored.banked_currency,
        skill_records: levels
            .into_iter()
            .map(|(id, level)| SkillLevelRecord::new(id, level))
            .collect(),
        current_area_level: stored.current_area_level,
        transition_shown: stored.transition_shown,
        last_save_time: stored.last_save_time.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use henhouse_engine::{compile_skill_database_from_str, SkillDatabase};

    use super::*;
    use crate::gameplay::economy::EconomyError;

    fn database() -> SkillDatabase {
        compile_skill_database_from_str(
            "skills.xml",
            r#"<Defs>
                <SkillDef><defName>dmg1</defName><label>A</label><effect>AttackDamage</effect><maxLevel>3</maxLevel><baseCost>10</baseCost><magnitude>5</magnitude></SkillDef>
                <SkillDef><defName>dmg2</defName><label>B</label><effect>AttackDamage</effect><maxLevel>3</maxLevel><baseCost>20</baseCost><magnitude>5</magnitude><prerequisite>dmg1</prerequisite></SkillDef>
            </Defs>"#,
        )
        .expect("db")
    }

    #[test]
    fn missing_bytes_decode_to_fresh_record() {
        assert_eq!(decode(None), SaveRecord::fresh());
    }

    #[test]
    fn corrupt_bytes_decode_to_fresh_record() {
        assert_eq!(decode(Some(b"{\"bankedCurrency\": 12")), SaveRecord::fresh());
        assert_eq!(decode(Some(b"not json")), SaveRecord::fresh());
        assert_eq!(
            decode(Some(br#"{"bankedCurrency": -4}"#)),
            SaveRecord::fresh()
        );
        assert_eq!(decode(Some(b"{} trailing")), SaveRecord::fresh());
    }

    #[test]
    fn absent_fields_default_to_zero_values() {
        let record = decode(Some(br#"{"bankedCurrency": 75}"#));
        assert_eq!(record.banked_currency, 75);
        assert!(record.skill_records.is_empty());
        assert_eq!(record.current_area_level, 0);
        assert!(!record.transition_shown);

        let record = decode(Some(br#"{"skillRecords": null}"#));
        assert!(record.skill_records.is_empty());
    }

    #[test]
    fn record_without_level_is_dropped_not_fatal() {
        let record = decode(Some(
            br#"{"bankedCurrency": 40, "skillRecords": [{"id": "dmg1"}, {"id": "dmg2", "level": 2}]}"#,
        ));
        assert_eq!(record.banked_currency, 40);
        assert_eq!(record.skill_records, vec![SkillLevelRecord::new("dmg2", 2)]);
    }

    #[test]
    fn legacy_flat_list_loads_as_level_one_and_reapplies_stats() {
        let db = database();
        let record = decode(Some(br#"{"bankedCurrency": 5, "unlockedSkillIds": ["dmg1", "dmg2"]}"#));
        assert_eq!(
            record.skill_records,
            vec![SkillLevelRecord::new("dmg1", 1), SkillLevelRecord::new("dmg2", 1)]
        );

        let progression = ProgressionState::from_records(&db, record.skill_records.clone());
        assert_eq!(progression.stats().attack_damage, 20.0);
    }

    #[test]
    fn legacy_alias_does_not_downgrade_leveled_records() {
        let record = decode(Some(
            br#"{"skillRecords": [{"id": "dmg1", "level": 3}, {"id": "dmg1", "level": 2}, {"id": "dmg2", "level": 0}],
                 "unlockedSkills": ["dmg1", "dmg2"]}"#,
        ));
        assert_eq!(
            record.skill_records,
            vec![SkillLevelRecord::new("dmg1", 3), SkillLevelRecord::new("dmg2", 1)]
        );
    }

    #[test]
    fn encode_writes_only_unlocked_skills_in_wire_shape() {
        let db = database();
        let mut progression = ProgressionState::new(&db);
        progression
            .try_upgrade(&db, "dmg1", |_| Ok::<u64, EconomyError>(0))
            .expect("upgrade");
        let economy = EconomyState::with_banked(42);
        let area = AreaProgress::new(3, true);
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).single().expect("time");

        let record = encode(&economy, &progression, &area, now);
        let json: serde_json::Value =
            serde_json::from_slice(&record.to_json_bytes().expect("bytes")).expect("json");
        assert_eq!(
            json,
            serde_json::json!({
                "saveVersion": SAVE_VERSION,
                "bankedCurrency": 42,
                "skillRecords": [{"id": "dmg1", "level": 1}],
                "currentAreaLevel": 3,
                "transitionShown": true,
                "lastSaveTime": "2026-03-01T12:30:00Z",
            })
        );
    }

    #[test]
    fn decode_of_encode_keeps_economy_area_and_levels() {
        let db = database();
        let progression = ProgressionState::from_records(
            &db,
            [SkillLevelRecord::new("dmg2", 2), SkillLevelRecord::new("dmg1", 3)],
        );
        let record = encode(
            &EconomyState::with_banked(900),
            &progression,
            &AreaProgress::new(4, false),
            Utc::now(),
        );

        let decoded = decode(Some(&record.to_json_bytes().expect("bytes")));
        assert_eq!(decoded.economy(), EconomyState::with_banked(900));
        assert_eq!(decoded.area(), AreaProgress::new(4, false));
        assert_eq!(
            ProgressionState::from_records(&db, decoded.skill_records),
            progression
        );
    }
}
