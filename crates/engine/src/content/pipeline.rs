use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::AppPaths;

use super::compiler::{compile_skill_database, ContentCompileError};
use super::database::SkillDatabase;

#[derive(Debug, Error)]
pub enum ContentLoadError {
    #[error("content directory not found: {0}")]
    ContentDirMissing(PathBuf),
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

/// Compiles the skill tree under `app_paths.content_dir`.
pub fn load_skill_database(app_paths: &AppPaths) -> Result<SkillDatabase, ContentLoadError> {
    if !app_paths.content_dir.is_dir() {
        return Err(ContentLoadError::ContentDirMissing(
            app_paths.content_dir.clone(),
        ));
    }

    let database = compile_skill_database(&app_paths.content_dir)?;
    if database.is_empty() {
        warn!(
            content_dir = %app_paths.content_dir.display(),
            "content_has_no_skill_defs"
        );
    }

    let unrecognized = database
        .skill_defs()
        .iter()
        .filter(|def| !def.effect.is_recognized())
        .count();
    info!(
        content_dir = %app_paths.content_dir.display(),
        skill_count = database.len(),
        unrecognized_effect_count = unrecognized,
        session_duration = database.baseline().session_duration,
        "content_load_summary"
    );
    Ok(database)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::app_paths_under;

    #[test]
    fn missing_content_dir_is_reported() {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_under(temp.path().to_path_buf()).expect("paths");
        let err = load_skill_database(&paths).expect_err("missing");
        assert!(matches!(err, ContentLoadError::ContentDirMissing(_)));
    }

    #[test]
    fn loads_skills_from_assets_base() {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_under(temp.path().to_path_buf()).expect("paths");
        fs::create_dir_all(&paths.content_dir).expect("content dir");
        fs::write(
            paths.content_dir.join("skills.xml"),
            r#"<Defs>
                <Baseline><initialChickens>4</initialChickens></Baseline>
                <SkillDef><defName>dmg1</defName><label>Sharp Beaks</label><effect>AttackDamage</effect><costs>10</costs><magnitude>5</magnitude></SkillDef>
            </Defs>"#,
        )
        .expect("write");

        let db = load_skill_database(&paths).expect("load");
        assert_eq!(db.len(), 1);
        assert_eq!(db.baseline().initial_chickens, 4);
    }

    #[test]
    fn compile_errors_pass_through() {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_under(temp.path().to_path_buf()).expect("paths");
        fs::create_dir_all(&paths.content_dir).expect("content dir");
        fs::write(paths.content_dir.join("bad.xml"), "<Things/>").expect("write");

        let err = load_skill_database(&paths).expect_err("invalid root");
        assert!(matches!(err, ContentLoadError::Compile(_)));
    }

    #[test]
    fn shipped_skill_tree_compiles() {
        let content_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/base");
        let db = compile_skill_database(&content_dir).expect("shipped content");

        assert!(db.len() >= 20);
        assert!(db.skill_defs().iter().all(|def| def.effect.is_recognized()));
        assert_eq!(db.baseline().session_duration, 30.0);
        let mammal = db.skill_def_by_name("mammal_instinct").expect("mammal_instinct");
        assert!(mammal.prerequisite.is_some());
    }
}
