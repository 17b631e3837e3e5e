//! Pipeline configuration: `input_path`, `target_path`, `logging_level`,
//! `module_name`, `suffix`, `dev`, `store_log`, plus the solver transport
//! settings, deserializable from an optional TOML file and overridable by
//! CLI flags — a batch compiler with this many knobs wants file-plus-flags
//! layering, not flags alone.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nestml_solver::DEFAULT_SOLVER_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoggingLevel {
    Info,
    Warn,
    Error,
}

impl LoggingLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LoggingLevel::Info => log::LevelFilter::Info,
            LoggingLevel::Warn => log::LevelFilter::Warn,
            LoggingLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// The pipeline's resolved configuration, after layering an optional TOML
/// file under CLI flag overrides (flags win).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub model_root: Option<PathBuf>,
    #[serde(default = "default_logging_level")]
    pub logging_level: LoggingLevel,
    pub module_name: Option<String>,
    pub suffix: Option<String>,
    /// Relaxes a documented subset of CoCos (see `pipeline::DEV_RELAXED_COCOS`)
    /// from ERROR to WARN, for iterating on a model under construction.
    #[serde(default)]
    pub dev: bool,
    /// Persist the full diagnostics log as JSON alongside `target_path`.
    #[serde(default)]
    pub store_log: bool,
    pub solver_command: Option<PathBuf>,
    #[serde(default = "default_solver_timeout_secs")]
    pub solver_timeout_secs: u64,
    #[serde(default = "default_sim_time_resolution")]
    pub sim_time_resolution: f64,
}

fn default_logging_level() -> LoggingLevel {
    LoggingLevel::Info
}

fn default_solver_timeout_secs() -> u64 {
    DEFAULT_SOLVER_TIMEOUT.as_secs()
}

fn default_sim_time_resolution() -> f64 {
    0.1
}

impl PipelineConfig {
    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }

    /// Load a TOML config file, if one was given, then apply CLI overrides.
    /// Flags always win over file values; `input_path` has no file-level
    /// default and must come from a flag or the file.
    pub fn load(config_file: Option<&PathBuf>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut base = match config_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
                toml::from_str::<PipelineConfig>(&text).map_err(|e| ConfigError::Parse(path.display().to_string(), e))?
            }
            None => PipelineConfig {
                input_path: PathBuf::new(),
                target_path: None,
                model_root: None,
                logging_level: LoggingLevel::Info,
                module_name: None,
                suffix: None,
                dev: false,
                store_log: false,
                solver_command: None,
                solver_timeout_secs: default_solver_timeout_secs(),
                sim_time_resolution: default_sim_time_resolution(),
            },
        };

        if let Some(input_path) = overrides.input_path {
            base.input_path = input_path;
        }
        if overrides.target_path.is_some() {
            base.target_path = overrides.target_path;
        }
        if overrides.model_root.is_some() {
            base.model_root = overrides.model_root;
        }
        if let Some(level) = overrides.logging_level {
            base.logging_level = level;
        }
        if overrides.module_name.is_some() {
            base.module_name = overrides.module_name;
        }
        if overrides.suffix.is_some() {
            base.suffix = overrides.suffix;
        }
        if overrides.dev {
            base.dev = true;
        }
        if overrides.store_log {
            base.store_log = true;
        }
        if overrides.solver_command.is_some() {
            base.solver_command = overrides.solver_command;
        }
        if let Some(timeout) = overrides.solver_timeout_secs {
            base.solver_timeout_secs = timeout;
        }

        if base.input_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingInputPath);
        }

        Ok(base)
    }
}

/// CLI-flag-derived overrides, kept separate from `PipelineConfig` so
/// `load` can distinguish "flag not passed" from "flag set to a falsy
/// value".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_path: Option<PathBuf>,
    pub target_path: Option<PathBuf>,
    pub model_root: Option<PathBuf>,
    pub logging_level: Option<LoggingLevel>,
    pub module_name: Option<String>,
    pub suffix: Option<String>,
    pub dev: bool,
    pub store_log: bool,
    pub solver_command: Option<PathBuf>,
    pub solver_timeout_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("parsing config file {0}: {1}")]
    Parse(String, #[source] toml::de::Error),

    #[error("no input_path configured (pass --input-path or set it in the config file)")]
    MissingInputPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nestml.toml");
        std::fs::write(&config_path, "input_path = \"/models\"\ndev = false\n").unwrap();

        let overrides = ConfigOverrides {
            dev: true,
            ..Default::default()
        };
        let config = PipelineConfig::load(Some(&config_path), overrides).unwrap();
        assert_eq!(config.input_path, PathBuf::from("/models"));
        assert!(config.dev);
    }

    #[test]
    fn missing_input_path_is_an_error() {
        let err = PipelineConfig::load(None, ConfigOverrides::default());
        assert!(matches!(err, Err(ConfigError::MissingInputPath)));
    }

    #[test]
    fn flag_only_input_path_with_no_config_file() {
        let overrides = ConfigOverrides {
            input_path: Some(PathBuf::from("/models/a.nestml")),
            ..Default::default()
        };
        let config = PipelineConfig::load(None, overrides).unwrap();
        assert_eq!(config.input_path, PathBuf::from("/models/a.nestml"));
        assert_eq!(config.solver_timeout_secs, DEFAULT_SOLVER_TIMEOUT.as_secs());
    }
}
