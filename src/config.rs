//! Configuration types for the command interpreter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{IntentError, Result};
use crate::intent::cache::DEFAULT_CACHE_CAPACITY;
use crate::intent::registry::DEFAULT_FUZZY_THRESHOLD;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Matching and dispatch settings.
    pub engine: EngineConfig,
    /// Assistant persona and built-in command settings.
    pub assistant: AssistantConfig,
    /// Code-edit fallback settings.
    pub edits: EditsConfig,
}

/// Intent engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop at the first command that matches (`true`) or fire every
    /// matching command (`false`).
    pub stop_on_first_match: bool,
    /// Threshold for fuzzy commands that do not set their own, in `0.0..=1.0`.
    pub default_fuzzy_threshold: f64,
    /// Maximum number of compiled patterns kept in the process-wide cache.
    ///
    /// Only the first registry built in the process sizes the cache.
    pub pattern_cache_capacity: u64,
    /// Lower-case input before dispatch.
    pub lowercase_input: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_on_first_match: true,
            default_fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            pattern_cache_capacity: DEFAULT_CACHE_CAPACITY,
            lowercase_input: true,
        }
    }
}

/// Assistant persona configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Display name of the assistant in the transcript.
    pub name: String,
    /// Display name of the user in the transcript.
    pub user_name: String,
    /// Directory the save command writes to. `None` disables saving.
    pub save_directory: Option<PathBuf>,
    /// Container runtime binary used by the run command.
    pub docker_binary: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Moby".to_owned(),
            user_name: "You".to_owned(),
            save_directory: None,
            docker_binary: "docker".to_owned(),
        }
    }
}

/// Code-edit fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditsConfig {
    /// Send unmatched utterances to the edit service as instructions.
    pub enabled: bool,
    /// Model requested from the edit service.
    pub model: String,
}

impl Default for EditsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: parley_edits::DEFAULT_EDIT_MODEL.to_owned(),
        }
    }
}

impl ParleyConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// [`validate`](Self::validate).
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| IntentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| IntentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/parley/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("parley").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("parley")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/parley-config/config.toml")
        }
    }

    /// Validates this configuration.
    ///
    /// Checks:
    /// - `engine.default_fuzzy_threshold` must lie within `0.0..=1.0`
    /// - `engine.pattern_cache_capacity` must be greater than 0
    /// - `edits.model` must not be empty when edits are enabled
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.engine.default_fuzzy_threshold) {
            return Err(IntentError::Config(
                "default_fuzzy_threshold must be within 0.0..=1.0".into(),
            ));
        }
        if self.engine.pattern_cache_capacity == 0 {
            return Err(IntentError::Config(
                "pattern_cache_capacity must be greater than 0".into(),
            ));
        }
        if self.edits.enabled && self.edits.model.trim().is_empty() {
            return Err(IntentError::Config(
                "edits.model must be set when edits are enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ParleyConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.engine.stop_on_first_match);
        assert!(config.engine.lowercase_input);
        assert!((config.engine.default_fuzzy_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.assistant.name, "Moby");
        assert!(!config.edits.enabled);
        assert_eq!(config.edits.model, "code-davinci-edit-001");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
[engine]
stop_on_first_match = false

[assistant]
save_directory = "/srv/dockerfiles"
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.engine.stop_on_first_match);
        assert_eq!(config.engine.pattern_cache_capacity, 512);
        assert_eq!(
            config.assistant.save_directory,
            Some(PathBuf::from("/srv/dockerfiles"))
        );
        assert_eq!(config.assistant.user_name, "You");
    }

    #[test]
    fn empty_toml_is_default() {
        let config: ParleyConfig = toml::from_str("").unwrap();
        assert!(config.engine.stop_on_first_match);
        assert_eq!(config.assistant.docker_binary, "docker");
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = ParleyConfig::default();
        config.engine.default_fuzzy_threshold = 1.2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_fuzzy_threshold"));
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let mut config = ParleyConfig::default();
        config.engine.pattern_cache_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pattern_cache_capacity"));
    }

    #[test]
    fn enabled_edits_need_a_model() {
        let mut config = ParleyConfig::default();
        config.edits.enabled = true;
        config.edits.model = "  ".into();
        assert!(config.validate().is_err());
        config.edits.model = "code-davinci-edit-001".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_path_ends_with_parley_config() {
        let path = ParleyConfig::default_config_path();
        assert!(path.ends_with("parley/config.toml"));
    }
}
