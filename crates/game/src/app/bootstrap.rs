use std::env;
use std::fs;
use std::io::{self, Read};

use henhouse::config::GameConfig;
use henhouse::gameplay::{GameSession, SessionOptions};
use henhouse_engine::{
    load_skill_database, resolve_app_paths, ContentLoadError, FileStorage, LoopConfig, Pacing,
    StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::script::{help_lines, parse_script, ScriptLine, ScriptParseError};

const STDIN_SCRIPT: &str = "-";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: GameSession,
    pub(crate) script: Vec<ScriptLine>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentLoadError),
    #[error("failed to read script {script_name}: {source}")]
    ReadScript {
        script_name: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Script(#[from] ScriptParseError),
}

/// `None` when the invocation only asked for usage.
pub(crate) fn build_app() -> Result<Option<AppWiring>, BootstrapError> {
    let script_arg = env::args().nth(1).unwrap_or_else(|| STDIN_SCRIPT.to_string());
    if script_arg == "--help" || script_arg == "-h" {
        print_usage();
        return Ok(None);
    }

    init_tracing();
    info!("=== Henhouse Startup ===");

    let game_config = GameConfig::from_env();
    let app_paths = resolve_app_paths()?;
    let database = load_skill_database(&app_paths)?;
    let script = parse_script(&read_script(&script_arg)?)?;
    info!(
        script = script_arg.as_str(),
        command_count = script.len(),
        "script_loaded"
    );

    let seed = game_config.seed.unwrap_or_else(rand::random::<u64>);
    info!(
        seed,
        save_file = game_config.save_file.as_str(),
        saves_dir = %app_paths.saves_dir.display(),
        "session_config"
    );
    let session = GameSession::load(
        database,
        Box::new(FileStorage::new(app_paths.saves_dir)),
        SessionOptions {
            save_key: game_config.save_file,
            save_debounce: game_config.save_debounce,
            seed,
        },
    );

    let config = LoopConfig {
        target_tps: game_config.target_tps,
        pacing: Pacing::Unpaced,
        ..LoopConfig::default()
    };
    Ok(Some(AppWiring {
        config,
        session,
        script,
    }))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn read_script(script_arg: &str) -> Result<String, BootstrapError> {
    let read_error = |source| BootstrapError::ReadScript {
        script_name: script_arg.to_string(),
        source,
    };
    if script_arg == STDIN_SCRIPT {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw).map_err(read_error)?;
        Ok(raw)
    } else {
        fs::read_to_string(script_arg).map_err(read_error)
    }
}

fn print_usage() {
    println!("usage: henhouse [SCRIPT | -]");
    println!();
    println!("Runs a session script (stdin when omitted). One command per line:");
    for line in help_lines() {
        println!("  {line}");
    }
}
