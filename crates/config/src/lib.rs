//! Configuration loading, validation, and management for ferrocode.
//!
//! Loads configuration from `~/.ferrocode/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ferrocode_core::PermissionCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bounds for `agent.max_iterations`.
pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 100;

/// The root configuration structure.
///
/// Maps directly to `~/.ferrocode/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model transport settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Engine loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Permission grants and safe mode
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP timeout for a single model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Tool rounds before the checkpoint orchestrator compacts history
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Upper bound on concurrently executing auto-approved calls
    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_max_parallel_tools() -> usize {
    8
}
fn default_system_prompt() -> String {
    "You are ferrocode, an autonomous coding agent. Use the available tools to inspect \
     and change the workspace, then report what you did."
        .into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_parallel_tools: default_max_parallel_tools(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_true")]
    pub read: bool,

    #[serde(default)]
    pub write: bool,

    #[serde(default)]
    pub execute: bool,

    /// Deny tools flagged unsafe regardless of grants
    #[serde(default)]
    pub safe_mode: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            execute: false,
            safe_mode: false,
        }
    }
}

impl PermissionsConfig {
    /// The categories granted up front.
    pub fn granted(&self) -> Vec<PermissionCategory> {
        let mut granted = Vec::new();
        if self.read {
            granted.push(PermissionCategory::Read);
        }
        if self.write {
            granted.push(PermissionCategory::Write);
        }
        if self.execute {
            granted.push(PermissionCategory::Execute);
        }
        granted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Location of the checkpoint artifact; defaults under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl CheckpointConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("checkpoint.md"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root the file tools are sandboxed to; defaults to the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
}

fn default_shell_timeout() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            shell_timeout_secs: default_shell_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn resolved_workspace(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ferrocode/config.toml).
    ///
    /// Environment overrides:
    /// - `FERROCODE_API_KEY`, then `OPENAI_API_KEY`, then `OPENROUTER_API_KEY`
    /// - `FERROCODE_API_URL`, `FERROCODE_MODEL`
    /// - `FERROCODE_SAFE_MODE` (`1`/`true`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("FERROCODE_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }
        if let Some(url) = lookup("FERROCODE_API_URL") {
            self.model.api_url = url;
        }
        if let Some(model) = lookup("FERROCODE_MODEL") {
            self.model.model = model;
        }
        if let Some(flag) = lookup("FERROCODE_SAFE_MODE") {
            self.permissions.safe_mode = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ferrocode")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.agent.max_iterations) {
            return Err(ConfigError::ValidationError(format!(
                "agent.max_iterations must be between {MIN_ITERATIONS} and {MAX_ITERATIONS}"
            )));
        }

        if self.agent.max_parallel_tools == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_parallel_tools must be at least 1".into(),
            ));
        }

        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("model.api_url is empty".into()));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
