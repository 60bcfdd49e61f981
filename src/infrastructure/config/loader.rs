//! Loads `activation.yaml` into a validated [`Config`].
//!
//! Layering mirrors the source project's config loader: programmatic
//! defaults, then the project YAML file, then environment variables, highest
//! precedence last. Validation happens once after extraction rather than
//! trusting the merged document blindly.

use std::collections::HashMap;
use std::env;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::models::BotConfig;
use crate::infrastructure::logging::LogConfig;

const DEFAULT_CONFIG_PATH: &str = "activation.yaml";
const CONFIG_PATH_ENV_VAR: &str = "ACTIVATION_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_fast_model")]
    pub fast: String,
    #[serde(default = "default_model")]
    pub default: String,
    #[serde(default = "default_strong_model")]
    pub strong: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_model(),
            default: default_model(),
            strong: default_strong_model(),
        }
    }
}

fn default_fast_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_strong_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_path() -> String {
    ".activation/activation.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

/// Top-level shape of `activation.yaml` (§3a).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bots: HashMap<String, BotConfig>,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from the project's `activation.yaml`,
    /// or the path named by `ACTIVATION_CONFIG_PATH` if set.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `activation.yaml` (or the env-overridden path)
    /// 3. Environment variables (`ACTIVATION_*`, highest priority)
    pub fn load() -> Result<Config, ConfigError> {
        let path = env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_file(&path)
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("ACTIVATION_").split("__"))
            .extract()
            .map_err(|e| ConfigError::InvalidYaml(e.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a merged configuration document. Known fields with invalid
    /// values fail here with a named `ConfigError`, never a panic.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".to_string(),
                value: String::new(),
            });
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                value: "0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: config.logging.level.clone(),
            });
        }

        for (name, bot) in &config.bots {
            if bot.intent.max_runs_per_day == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("bots.{name}.intent.max_runs_per_day"),
                    value: "0".to_string(),
                });
            }
            if bot.pulse.active_hours_start > 24 || bot.pulse.active_hours_end > 24 {
                return Err(ConfigError::InvalidValue {
                    field: format!("bots.{name}.pulse.active_hours"),
                    value: format!("{}-{}", bot.pulse.active_hours_start, bot.pulse.active_hours_end),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.max_connections, 5);
        ConfigLoader::validate(&config).expect("default config should validate");
    }

    #[test]
    fn yaml_parses_bot_intent_and_pulse() {
        let yaml = r#"
bots:
  job_scout:
    display_name: "Job Scout"
    enabled: true
    timeout_minutes: 10
    heartbeat_hours: 6
    intent:
      cooldown_minutes: 30
      max_runs_per_day: 6
      signals:
        - pattern: "user:job_saved"
          priority: medium
    pulse:
      enabled: false
      active_hours_start: 6
      active_hours_end: 22
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");
        let bot = config.bots.get("job_scout").expect("job_scout should be present");
        assert_eq!(bot.intent.cooldown_minutes, 30);
        assert_eq!(bot.intent.signals[0].pattern, "user:job_saved");
        assert_eq!(bot.heartbeat_hours, 6);
        ConfigLoader::validate(&config).expect("parsed config should validate");
    }

    #[test]
    fn rejects_zero_max_runs_per_day() {
        let mut config = Config::default();
        let mut bot = BotConfig::new("job_scout");
        bot.intent.max_runs_per_day = 0;
        config.bots.insert("job_scout".to_string(), bot);

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn load_from_file_reads_yaml_and_merges_defaults() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database:\n  path: \"/tmp/custom.db\"\n  max_connections: 9").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).expect("should load");
        assert_eq!(config.database.path, "/tmp/custom.db");
        assert_eq!(config.database.max_connections, 9);
        // untouched defaults still apply
        assert_eq!(config.models.default, "gpt-4o");
    }
}
