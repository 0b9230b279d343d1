//! Agent configuration file support.
//!
//! Settings are layered: global file, local file, environment, then
//! whatever the caller applies on top (command-line flags). Every field is
//! optional in the file form so that later layers only override what they
//! actually set.

use conduit_models::{ModelConfig, ModelType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::planner::{DEFAULT_HISTORY_WINDOW, DEFAULT_PLANNING_TIMEOUT};

/// Default text model.
pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash";

/// Default provider name.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Model provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// `gemini` or `mock`
    #[serde(default)]
    pub provider: Option<String>,

    /// Text model id
    #[serde(default)]
    pub model_id: Option<String>,

    /// Model used for OCR; defaults to `model_id`
    #[serde(default)]
    pub vision_model_id: Option<String>,

    /// Provider API key
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Bound on the planning model call, in seconds
    #[serde(default)]
    pub planning_timeout_secs: Option<u64>,

    /// Messages kept per conversation
    #[serde(default)]
    pub history_limit: Option<usize>,

    /// Messages shown to the planner and in answer prompts
    #[serde(default)]
    pub history_window: Option<usize>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Model provider settings
    #[serde(default)]
    pub model: ModelSettings,
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".conduit").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".conduitrc")
    }

    /// Discover and load configuration files, then apply the process
    /// environment.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.conduit/config.toml)
    /// 2. Local config (./.conduitrc)
    /// 3. Environment variables
    ///
    /// Later sources override earlier ones. Missing files are skipped; a file
    /// that exists but cannot be read or parsed is an error.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let mut config = Self::load_layers(&[Self::default_global_path(), Self::default_local_path()])?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Merges the given files in order, skipping those that do not exist.
    pub fn load_layers(paths: &[PathBuf]) -> ConfigResult<Self> {
        let mut config = Self::default();
        for path in paths {
            if !path.exists() {
                continue;
            }
            debug!(path = %path.display(), "Loading configuration file");
            config.merge(&Self::load_from_file(path)?);
        }
        Ok(config)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        fn take<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }

        take(&mut self.model.provider, other.model.provider.as_ref());
        take(&mut self.model.model_id, other.model.model_id.as_ref());
        take(&mut self.model.vision_model_id, other.model.vision_model_id.as_ref());
        take(&mut self.model.api_key, other.model.api_key.as_ref());
        take(&mut self.planning_timeout_secs, other.planning_timeout_secs.as_ref());
        take(&mut self.history_limit, other.history_limit.as_ref());
        take(&mut self.history_window, other.history_window.as_ref());
        take(&mut self.log_level, other.log_level.as_ref());
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Recognized variables: `GEMINI_API_KEY`, `CONDUIT_PROVIDER`,
    /// `CONDUIT_MODEL`, `CONDUIT_LOG_LEVEL`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = read("GEMINI_API_KEY") {
            self.model.api_key = Some(api_key);
        }
        if let Some(provider) = read("CONDUIT_PROVIDER") {
            self.model.provider = Some(provider);
        }
        if let Some(model_id) = read("CONDUIT_MODEL") {
            self.model.model_id = Some(model_id);
        }
        if let Some(log_level) = read("CONDUIT_LOG_LEVEL") {
            self.log_level = Some(log_level);
        }
    }

    /// The configured provider.
    pub fn provider(&self) -> ConfigResult<ModelType> {
        let name = self.model.provider.as_deref().unwrap_or(DEFAULT_PROVIDER);
        name.parse::<ModelType>()
            .map_err(|()| ConfigError::InvalidValue(format!("unknown model provider '{name}'")))
    }

    /// Text model id.
    pub fn model_id(&self) -> &str {
        self.model.model_id.as_deref().unwrap_or(DEFAULT_MODEL_ID)
    }

    /// OCR model id.
    pub fn vision_model_id(&self) -> &str {
        self.model.vision_model_id.as_deref().unwrap_or_else(|| self.model_id())
    }

    /// Bound on the planning model call.
    pub fn planning_timeout(&self) -> Duration {
        self.planning_timeout_secs.map_or(DEFAULT_PLANNING_TIMEOUT, Duration::from_secs)
    }

    /// Messages kept per conversation.
    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    /// Messages shown to the planner and in answer prompts.
    pub fn history_window(&self) -> usize {
        self.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW)
    }

    /// Checks values that would only fail later at run time.
    pub fn validate(&self) -> ConfigResult<()> {
        self.provider()?;
        if self.planning_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue("planning_timeout_secs must be positive".to_string()));
        }
        if self.history_limit == Some(0) {
            return Err(ConfigError::InvalidValue("history_limit must be positive".to_string()));
        }
        Ok(())
    }

    /// Model configuration for the text model.
    pub fn model_config(&self) -> ConfigResult<ModelConfig> {
        self.build_model_config(self.model_id())
    }

    /// Model configuration for the OCR model.
    pub fn vision_model_config(&self) -> ConfigResult<ModelConfig> {
        self.build_model_config(self.vision_model_id())
    }

    fn build_model_config(&self, model_id: &str) -> ConfigResult<ModelConfig> {
        let mut config = ModelConfig::new(self.provider()?, model_id.to_string());
        if let Some(api_key) = &self.model.api_key {
            config = config.with_api_key(api_key.clone());
        }
        Ok(config)
    }
}
