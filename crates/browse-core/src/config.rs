//! Configuration types for Browse.
//!
//! Two sources feed a run:
//! - `browse.yml` (optional) tunes the run loop, the engine command, and where
//!   session exports go.
//! - The environment carries the language model provider credentials, which
//!   are all required and read once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the provider endpoint URL.
pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable holding the provider API key.
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// Environment variable holding the model deployment name.
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
/// Environment variable holding the provider API version.
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
/// Optional override for `engine.command`.
pub const ENV_ENGINE_COMMAND: &str = "BROWSE_ENGINE_COMMAND";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl BrowseConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(
            max_steps = config.run.max_steps,
            engine = %config.engine.command,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(command) = lookup(ENV_ENGINE_COMMAND).filter(|c| !c.trim().is_empty()) {
            debug!(command = %command, "Engine command overridden from environment");
            self.engine.command = command;
        }
    }

    /// Rejects values that would make the run loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let run = &self.run;
        if run.max_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "run.max_steps",
                message: "must be at least 1".to_string(),
            });
        }
        if run.repetition_window < 2 {
            return Err(ConfigError::Invalid {
                field: "run.repetition_window",
                message: "must be at least 2".to_string(),
            });
        }
        if !(run.repetition_threshold > 0.0 && run.repetition_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "run.repetition_threshold",
                message: format!("{} is outside (0, 1]", run.repetition_threshold),
            });
        }
        if !(run.max_steps_warning_ratio > 0.0 && run.max_steps_warning_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "run.max_steps_warning_ratio",
                message: format!("{} is outside (0, 1]", run.max_steps_warning_ratio),
            });
        }
        if run.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "run.failure_threshold",
                message: "must be at least 1".to_string(),
            });
        }
        if self.engine.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine.command",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Tuning for the per-step run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Initial step budget per task.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Start tasks in the visually-grounded mode.
    #[serde(default)]
    pub use_vision: bool,

    /// Minimum steps between two phase prompts (checkpoint or sub-goal).
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Consecutive failed steps before the user is asked for help.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Number of recent actions compared for repetition.
    #[serde(default = "default_repetition_window")]
    pub repetition_window: usize,

    /// Word-set similarity at which two actions count as the same.
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: f64,

    /// Fraction of the step budget after which the user is warned.
    #[serde(default = "default_warning_ratio")]
    pub max_steps_warning_ratio: f64,
}

fn default_max_steps() -> u32 {
    25
}

fn default_checkpoint_interval() -> u32 {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_repetition_window() -> usize {
    3
}

fn default_repetition_threshold() -> f64 {
    0.7
}

fn default_warning_ratio() -> f64 {
    0.8
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            use_vision: false,
            checkpoint_interval: default_checkpoint_interval(),
            failure_threshold: default_failure_threshold(),
            repetition_window: default_repetition_window(),
            repetition_threshold: default_repetition_threshold(),
            max_steps_warning_ratio: default_warning_ratio(),
        }
    }
}

/// How to launch the external automation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable speaking the engine bridge protocol.
    #[serde(default = "default_engine_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

fn default_engine_command() -> String {
    "browse-engine".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
        }
    }
}

/// Session export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory session summaries are written to.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

/// Credentials for the language model provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl ProviderConfig {
    /// Reads provider settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads provider settings through `lookup`.
    ///
    /// Every variable is required; the first missing or blank one is named in
    /// the error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var: &'static str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv { var })
        };

        Ok(Self {
            endpoint: require(ENV_ENDPOINT)?,
            api_key: require(ENV_API_KEY)?,
            deployment: require(ENV_DEPLOYMENT)?,
            api_version: require(ENV_API_VERSION)?,
        })
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable {var}")]
    MissingEnv { var: &'static str },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_ENDPOINT, "https://example.openai.azure.com"),
            (ENV_API_KEY, "secret"),
            (ENV_DEPLOYMENT, "gpt-4o"),
            (ENV_API_VERSION, "2024-08-01-preview"),
        ])
    }

    #[test]
    fn test_default_config() {
        let config = BrowseConfig::default();
        assert_eq!(config.run.max_steps, 25);
        assert!(!config.run.use_vision);
        assert_eq!(config.run.checkpoint_interval, 5);
        assert_eq!(config.run.repetition_window, 3);
        assert!((config.run.repetition_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.session.export_dir, PathBuf::from("logs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
run:
  max_steps: 40
  use_vision: true
engine:
  command: "python"
  args: ["-m", "browse_engine"]
"#;
        let config: BrowseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.run.max_steps, 40);
        assert!(config.run.use_vision);
        assert_eq!(config.run.failure_threshold, 3);
        assert_eq!(config.engine.args, vec!["-m", "browse_engine"]);
        assert_eq!(config.session.export_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browse.yml");
        std::fs::write(&path, "session:\n  export_dir: out\n").unwrap();

        let config = BrowseConfig::from_file(&path).unwrap();
        assert_eq!(config.session.export_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = BrowseConfig::default();
        config.run.max_steps = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("run.max_steps"));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = BrowseConfig::default();
        config.run.repetition_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_command_env_override() {
        let mut config = BrowseConfig::default();
        let vars = env(&[(ENV_ENGINE_COMMAND, "/opt/engine")]);
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.engine.command, "/opt/engine");
    }

    #[test]
    fn test_provider_reads_all_vars() {
        let vars = full_env();
        let provider = ProviderConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(provider.deployment, "gpt-4o");
        assert!(!format!("{provider:?}").contains("secret"));
    }

    #[test]
    fn test_provider_names_missing_var() {
        let mut vars = full_env();
        vars.remove(ENV_DEPLOYMENT);
        let err = ProviderConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { var } if var == ENV_DEPLOYMENT));
        assert!(err.to_string().contains("AZURE_OPENAI_DEPLOYMENT_NAME"));
    }

    #[test]
    fn test_provider_treats_blank_as_missing() {
        let mut vars = full_env();
        vars.insert(ENV_API_KEY.to_string(), "   ".to_string());
        let err = ProviderConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }
}
