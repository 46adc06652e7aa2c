use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod storage;

pub use app::{
    plan_sim_steps, run_headless, LoopConfig, LoopControl, LoopError, LoopMetricsSnapshot,
    LoopSummary, Pacing, Simulation, StepPlan,
};
pub use content::{
    compile_skill_database, compile_skill_database_from_str, load_skill_database, BaselineStats,
    ContentCompileError, ContentErrorCode, ContentLoadError, CostCurve, MagnitudeCurve,
    SkillDatabase, SkillDef, SkillDefId, SkillEffect, SourceLocation, MIN_ATTACK_INTERVAL,
};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError};

pub const ROOT_ENV_VAR: &str = "HENHOUSE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub saves_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "HENHOUSE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/henhouse\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_under(root)
}

pub fn app_paths_under(root: PathBuf) -> Result<AppPaths, StartupError> {
    let content_dir = root.join("assets").join("base");
    let saves_dir = root.join("saves");

    fs::create_dir_all(&saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: saves_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        content_dir,
        saves_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn repo_marker_accepts_cargo_toml_with_assets() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("cargo toml");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn app_paths_under_creates_saves_dir() {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_under(temp.path().to_path_buf()).expect("paths");
        assert!(paths.saves_dir.is_dir());
        assert!(paths.content_dir.ends_with(Path::new("assets").join("base")));
    }
}
