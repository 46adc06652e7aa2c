use std::collections::{BTreeSet, HashMap};

use super::types::{BaselineStats, CostCurve, MagnitudeCurve, SkillEffect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkillDefId(pub u32);

#[derive(Debug, Clone)]
pub struct SkillDef {
    pub id: SkillDefId,
    pub def_name: String,
    pub label: String,
    pub description: Option<String>,
    pub effect: SkillEffect,
    pub max_level: u32,
    pub cost: CostCurve,
    pub magnitude: MagnitudeCurve,
    pub prerequisite: Option<SkillDefId>,
}

impl SkillDef {
    /// Cost of moving from `current_level` to the next one, `None` once maxed.
    pub fn cost_for_level(&self, current_level: u32) -> Option<u64> {
        (current_level < self.max_level).then(|| self.cost.cost_at(current_level))
    }

    pub fn magnitude_for_level(&self, level_index: u32) -> f32 {
        self.magnitude.magnitude_at(level_index)
    }
}

/// Skill definition before prerequisite names are resolved to ids.
#[derive(Debug, Clone)]
pub(crate) struct PendingSkillDef {
    pub def_name: String,
    pub label: String,
    pub description: Option<String>,
    pub effect: SkillEffect,
    pub max_level: u32,
    pub cost: CostCurve,
    pub magnitude: MagnitudeCurve,
    pub prerequisite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PrerequisiteError {
    Unknown {
        def_name: String,
        prerequisite: String,
    },
    SelfReference {
        def_name: String,
    },
    Cycle {
        def_names: Vec<String>,
    },
}

#[derive(Debug, Default, Clone)]
pub struct SkillDatabase {
    baseline: BaselineStats,
    skill_defs: Vec<SkillDef>,
    skill_ids_by_name: HashMap<String, SkillDefId>,
    application_order: Vec<SkillDefId>,
}

impl SkillDatabase {
    /// Ids are assigned in input order; callers pass defs sorted by name so ids
    /// stay stable across runs.
    pub(crate) fn from_pending(
        baseline: BaselineStats,
        pending: Vec<PendingSkillDef>,
    ) -> Result<Self, PrerequisiteError> {
        let mut skill_ids_by_name = HashMap::with_capacity(pending.len());
        for (idx, def) in pending.iter().enumerate() {
            skill_ids_by_name.insert(def.def_name.clone(), SkillDefId(idx as u32));
        }

        let mut skill_defs = Vec::with_capacity(pending.len());
        for (idx, def) in pending.into_iter().enumerate() {
            let prerequisite = match def.prerequisite {
                Some(name) if name == def.def_name => {
                    return Err(PrerequisiteError::SelfReference {
                        def_name: def.def_name,
                    })
                }
                Some(name) => match skill_ids_by_name.get(&name) {
                    Some(id) => Some(*id),
                    None => {
                        return Err(PrerequisiteError::Unknown {
                            def_name: def.def_name,
                            prerequisite: name,
                        })
                    }
                },
                None => None,
            };
            skill_defs.push(SkillDef {
                id: SkillDefId(idx as u32),
                def_name: def.def_name,
                label: def.label,
                description: def.description,
                effect: def.effect,
                max_level: def.max_level,
                cost: def.cost,
                magnitude: def.magnitude,
                prerequisite,
            });
        }

        let application_order = prerequisite_order(&skill_defs)?;
        Ok(Self {
            baseline,
            skill_defs,
            skill_ids_by_name,
            application_order,
        })
    }

    pub fn baseline(&self) -> &BaselineStats {
        &self.baseline
    }

    pub fn skill_def_id_by_name(&self, name: &str) -> Option<SkillDefId> {
        self.skill_ids_by_name.get(name).copied()
    }

    pub fn skill_def(&self, id: SkillDefId) -> Option<&SkillDef> {
        self.skill_defs.get(id.0 as usize)
    }

    pub fn skill_def_by_name(&self, name: &str) -> Option<&SkillDef> {
        self.skill_def_id_by_name(name)
            .and_then(|id| self.skill_def(id))
    }

    pub fn prerequisite_of(&self, def: &SkillDef) -> Option<&SkillDef> {
        def.prerequisite.and_then(|id| self.skill_def(id))
    }

    pub fn skill_defs(&self) -> &[SkillDef] {
        &self.skill_defs
    }

    /// Every skill, prerequisites strictly before dependents; ties broken by id.
    pub fn application_order(&self) -> impl Iterator<Item = &SkillDef> {
        self.application_order
            .iter()
            .filter_map(|id| self.skill_def(*id))
    }

    pub fn len(&self) -> usize {
        self.skill_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skill_defs.is_empty()
    }
}

fn prerequisite_order(skill_defs: &[SkillDef]) -> Result<Vec<SkillDefId>, PrerequisiteError> {
    let mut dependents: HashMap<SkillDefId, Vec<SkillDefId>> = HashMap::new();
    let mut pending_prereqs = vec![0usize; skill_defs.len()];
    for def in skill_defs {
        if let Some(prereq) = def.prerequisite {
            dependents.entry(prereq).or_default().push(def.id);
            pending_prereqs[def.id.0 as usize] += 1;
        }
    }

    let mut ready = skill_defs
        .iter()
        .filter(|def| def.prerequisite.is_none())
        .map(|def| def.id)
        .collect::<BTreeSet<_>>();
    let mut order = Vec::with_capacity(skill_defs.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for dependent in dependents.get(&next).into_iter().flatten() {
            let remaining = &mut pending_prereqs[dependent.0 as usize];
            *remaining -= 1;
            if *remaining == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() != skill_defs.len() {
        let def_names = skill_defs
            .iter()
            .filter(|def| pending_prereqs[def.id.0 as usize] > 0)
            .map(|def| def.def_name.clone())
            .collect();
        return Err(PrerequisiteError::Cycle { def_names });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(name: &str, prerequisite: Option<&str>) -> PendingSkillDef {
        PendingSkillDef {
            def_name: name.to_string(),
            label: name.to_uppercase(),
            description: None,
            effect: SkillEffect::AttackDamage,
            max_level: 3,
            cost: CostCurve::Table(vec![10, 20, 40]),
            magnitude: MagnitudeCurve::Constant(5.0),
            prerequisite: prerequisite.map(ToString::to_string),
        }
    }

    #[test]
    fn application_order_puts_prerequisites_first() {
        let db = SkillDatabase::from_pending(
            BaselineStats::default(),
            vec![
                pending("a_late", Some("z_root")),
                pending("m_mid", None),
                pending("z_root", None),
            ],
        )
        .expect("db");
        let order = db
            .application_order()
            .map(|def| def.def_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["m_mid", "z_root", "a_late"]);
    }

    #[test]
    fn diamond_dependencies_are_accepted() {
        let db = SkillDatabase::from_pending(
            BaselineStats::default(),
            vec![
                pending("base", None),
                pending("left", Some("base")),
                pending("right", Some("base")),
                pending("top", Some("left")),
            ],
        )
        .expect("db");
        let top = db.skill_def_by_name("top").expect("top");
        assert_eq!(
            db.prerequisite_of(top).map(|def| def.def_name.as_str()),
            Some("left")
        );
    }

    #[test]
    fn unknown_prerequisite_is_rejected() {
        let error = SkillDatabase::from_pending(
            BaselineStats::default(),
            vec![pending("a", Some("ghost"))],
        )
        .expect_err("error");
        assert_eq!(
            error,
            PrerequisiteError::Unknown {
                def_name: "a".to_string(),
                prerequisite: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn cycle_is_rejected_with_members() {
        let error = SkillDatabase::from_pending(
            BaselineStats::default(),
            vec![pending("a", Some("b")), pending("b", Some("a")), pending("c", None)],
        )
        .expect_err("error");
        let PrerequisiteError::Cycle { def_names } = error else {
            panic!("expected cycle");
        };
        assert_eq!(def_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn cost_for_level_is_none_when_maxed() {
        let db = SkillDatabase::from_pending(BaselineStats::default(), vec![pending("a", None)])
            .expect("db");
        let def = db.skill_def_by_name("a").expect("a");
        assert_eq!(def.cost_for_level(0), Some(10));
        assert_eq!(def.cost_for_level(2), Some(40));
        assert_eq!(def.cost_for_level(3), None);
    }
}
