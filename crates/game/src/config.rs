use std::env;
use std::time::Duration;

use tracing::warn;

pub const SAVE_FILE_ENV_VAR: &str = "HENHOUSE_SAVE_FILE";
pub const SEED_ENV_VAR: &str = "HENHOUSE_SEED";
pub const SAVE_DEBOUNCE_ENV_VAR: &str = "HENHOUSE_SAVE_DEBOUNCE_MS";
pub const TPS_ENV_VAR: &str = "HENHOUSE_TPS";

pub const DEFAULT_SAVE_FILE: &str = "henhouse.save.json";
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_TARGET_TPS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub save_file: String,
    /// `None` picks a fresh seed per run.
    pub seed: Option<u64>,
    pub save_debounce: Duration,
    pub target_tps: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            save_file: DEFAULT_SAVE_FILE.to_string(),
            seed: None,
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            target_tps: DEFAULT_TARGET_TPS,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(error) => {
                warn!(env_var = name, error = %error, "unable to read env var; using default");
                None
            }
        })
    }

    /// Builds the config from any name -> value source. Invalid values are
    /// logged and replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let save_file = lookup(SAVE_FILE_ENV_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|value| {
                let valid = !value.is_empty() && !value.contains(['/', '\\']);
                if !valid {
                    warn!(
                        env_var = SAVE_FILE_ENV_VAR,
                        value = value.as_str(),
                        "invalid env var value; using default"
                    );
                }
                valid
            })
            .unwrap_or(defaults.save_file);

        let seed = parse_env(&lookup, SEED_ENV_VAR, |raw| raw.parse::<u64>().ok());

        let save_debounce = parse_env(&lookup, SAVE_DEBOUNCE_ENV_VAR, |raw| {
            raw.parse::<u64>().ok().map(Duration::from_millis)
        })
        .unwrap_or(defaults.save_debounce);

        let target_tps = parse_env(&lookup, TPS_ENV_VAR, |raw| {
            raw.parse::<u32>().ok().filter(|tps| *tps > 0)
        })
        .unwrap_or(defaults.target_tps);

        Self {
            save_file,
            seed,
            save_debounce,
            target_tps,
        }
    }
}

fn parse_env<T, F, P>(lookup: &F, name: &'static str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = lookup(name)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(
            env_var = name,
            value = raw.as_str(),
            "invalid env var value; using default"
        );
    }
    parsed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> GameConfig {
        let vars = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        GameConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config_from(&[]), GameConfig::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = config_from(&[
            (SAVE_FILE_ENV_VAR, "slot2.json"),
            (SEED_ENV_VAR, " 1234 "),
            (SAVE_DEBOUNCE_ENV_VAR, "250"),
            (TPS_ENV_VAR, "30"),
        ]);
        assert_eq!(config.save_file, "slot2.json");
        assert_eq!(config.seed, Some(1234));
        assert_eq!(config.save_debounce, Duration::from_millis(250));
        assert_eq!(config.target_tps, 30);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            (SAVE_FILE_ENV_VAR, "../escape.json"),
            (SEED_ENV_VAR, "lucky"),
            (SAVE_DEBOUNCE_ENV_VAR, "-5"),
            (TPS_ENV_VAR, "0"),
        ]);
        assert_eq!(config, GameConfig::default());
    }
}
