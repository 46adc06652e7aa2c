pub(crate) mod atomic_io;
mod compiler;
mod database;
mod pipeline;
mod types;

pub use compiler::{
    compile_skill_database, compile_skill_database_from_str, ContentCompileError,
    ContentErrorCode, SourceLocation,
};
pub use database::{SkillDatabase, SkillDef, SkillDefId};
pub use pipeline::{load_skill_database, ContentLoadError};
pub use types::{BaselineStats, CostCurve, MagnitudeCurve, SkillEffect, MIN_ATTACK_INTERVAL};
