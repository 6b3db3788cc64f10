//! Configuration loading, validation, and management for RelayClaw.
//!
//! Loads configuration from `relayclaw.toml` (or the path given with
//! `--config`) with environment variable overrides. Validates all settings
//! at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "relayclaw.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Orchestrator limits and history policy
    #[serde(default)]
    pub agent: AgentConfig,

    /// Endpoint settings
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Built-in tool switches and guards
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Scheduled synthetic messages
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Skill-document ingestion
    #[serde(default)]
    pub skills: SkillsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
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

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// How conversation history is partitioned between endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// One history for the whole runtime; exchanges are serialized.
    #[default]
    Shared,
    /// One history per channel; exchanges serialize within a channel only.
    PerChannel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base system prompt; skill context is appended to it
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Hard cap on model calls per exchange
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default = "default_max_concurrent_exchanges")]
    pub max_concurrent_exchanges: usize,

    #[serde(default)]
    pub history_scope: HistoryScope,

    #[serde(default = "default_stream_open_timeout")]
    pub stream_open_timeout_secs: u64,

    /// Longest wait for the next delta before the stream is treated as ended
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_system_prompt() -> String {
    "You are a helpful AI agent.".into()
}
fn default_max_turns() -> usize {
    5
}
fn default_max_concurrent_exchanges() -> usize {
    8
}
fn default_stream_open_timeout() -> u64 {
    30
}
fn default_stream_idle_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    60
}

impl AgentConfig {
    pub fn stream_open_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_open_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_turns: default_max_turns(),
            max_concurrent_exchanges: default_max_concurrent_exchanges(),
            history_scope: HistoryScope::default(),
            stream_open_timeout_secs: default_stream_open_timeout(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Capacity of the merged inbound queue
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Bound on a single outbound delivery
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_ms: u64,

    #[serde(default)]
    pub console: ConsoleConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_inbound_capacity() -> usize {
    100
}
fn default_delivery_timeout() -> u64 {
    5_000
}
fn default_true() -> bool {
    true
}

impl ChannelsConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            delivery_timeout_ms: default_delivery_timeout(),
            console: ConsoleConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Telegram Bot API endpoint. Replies are sent whole, never streamed.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// User IDs or usernames allowed to talk to the bot. Empty denies
    /// everyone, `["*"]` allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Chat that receives messages nobody asked for (scheduled replies)
    /// until someone writes to the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    /// Long-poll wait passed to `getUpdates`
    #[serde(default = "default_telegram_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_telegram_poll_timeout() -> u64 {
    30
}

impl TelegramConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            api_base: default_telegram_api_base(),
            allowed_users: vec![],
            chat_id: None,
            poll_timeout_secs: default_telegram_poll_timeout(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("bot_token", &redact(&self.bot_token))
            .field("api_base", &self.api_base)
            .field("allowed_users", &self.allowed_users)
            .field("chat_id", &self.chat_id)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub shell_enabled: bool,

    #[serde(default = "default_true")]
    pub file_enabled: bool,

    /// Register `browser_open` (fetches pages over HTTP)
    #[serde(default = "default_true")]
    pub browser_enabled: bool,

    /// Commands `shell_run` may start. Empty means any command.
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    /// Roots the file tools may touch. Empty means anywhere not forbidden.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,

    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<PathBuf>,
}

fn default_forbidden_paths() -> Vec<PathBuf> {
    ["/etc/shadow", "/etc/sudoers", "/proc", "/sys"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_enabled: true,
            file_enabled: true,
            browser_enabled: true,
            allowed_commands: vec![],
            allowed_roots: vec![],
            forbidden_paths: default_forbidden_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Channel that receives replies to scheduled messages
    #[serde(default = "default_scheduler_channel")]
    pub default_channel: String,

    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

fn default_scheduler_channel() -> String {
    "console".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_channel: default_scheduler_channel(),
            jobs: vec![],
        }
    }
}

/// A job registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Six-field cron expression (`sec min hour dom month dow`)
    pub schedule: String,
    pub task: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_skills_dir")]
    pub dir: PathBuf,
}

fn default_skills_dir() -> PathBuf {
    PathBuf::from("skills")
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_skills_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or `relayclaw.toml` when `None`.
    ///
    /// Environment variables override the file:
    /// - `RELAYCLAW_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `RELAYCLAW_BASE_URL`
    /// - `RELAYCLAW_MODEL`
    /// - `TELEGRAM_BOT_TOKEN` (only when no token is configured)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("RELAYCLAW_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(base_url) = lookup("RELAYCLAW_BASE_URL") {
            self.provider.base_url = base_url;
        }

        if let Some(model) = lookup("RELAYCLAW_MODEL") {
            self.provider.model = model;
        }

        if self.channels.telegram.bot_token.is_none() {
            self.channels.telegram.bot_token = lookup("TELEGRAM_BOT_TOKEN");
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider.model must not be empty".into()));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError("agent.max_turns must be > 0".into()));
        }

        if self.agent.max_concurrent_exchanges == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_concurrent_exchanges must be > 0".into(),
            ));
        }

        if self.channels.inbound_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channels.inbound_capacity must be > 0".into(),
            ));
        }

        let telegram = &self.channels.telegram;
        if telegram.enabled && !telegram.api_base.starts_with("http") {
            return Err(ConfigError::ValidationError(
                "channels.telegram.api_base must be an http(s) URL".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Render the configuration as TOML, with secrets removed.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        redacted.provider.api_key = None;
        redacted.channels.telegram.bot_token = None;
        toml::to_string_pretty(&redacted).map_err(|e| ConfigError::SerializeError(e.to_string()))
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

    #[error("Failed to render configuration: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.channels.inbound_capacity, 100);
        assert_eq!(config.agent.history_scope, HistoryScope::Shared);
        assert_eq!(config.scheduler.default_channel, "console");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.agent.max_turns, config.agent.max_turns);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_turn_cap_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_turns = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_turns"));
    }

    #[test]
    fn zero_capacities_rejected() {
        let mut config = AppConfig::default();
        config.channels.inbound_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_concurrent_exchanges = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_rejected() {
        let mut config = AppConfig::default();
        config.provider.model = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/relayclaw.toml")).unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relayclaw.toml");
        std::fs::write(
            &path,
            r#"
[provider]
model = "deepseek-reasoner"
base_url = "https://api.deepseek.com/v1"

[agent]
history_scope = "per_channel"
max_turns = 3

[[scheduler.jobs]]
schedule = "0 */5 * * * *"
task = "check the inbox"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider.model, "deepseek-reasoner");
        assert_eq!(config.agent.history_scope, HistoryScope::PerChannel);
        assert_eq!(config.agent.max_turns, 3);
        assert_eq!(config.agent.tool_timeout_secs, 60);
        assert_eq!(config.scheduler.jobs.len(), 1);
        assert_eq!(config.scheduler.jobs[0].task, "check the inbox");
        assert!(config.tools.shell_enabled);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relayclaw.toml");
        std::fs::write(&path, "[agent\nmax_turns = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("RELAYCLAW_MODEL", "gpt-4o"),
            ("RELAYCLAW_BASE_URL", "http://localhost:11434/v1"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn relayclaw_key_wins_and_file_key_is_kept() {
        let lookup = |k: &str| match k {
            "RELAYCLAW_API_KEY" => Some("sk-relay".to_string()),
            "OPENAI_API_KEY" => Some("sk-openai".to_string()),
            _ => None,
        };

        let mut config = AppConfig::default();
        config.apply_env_overrides(lookup);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-relay"));

        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-file".into());
        config.apply_env_overrides(lookup);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn rendered_toml_never_contains_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        config.channels.telegram.bot_token = Some("123:bot-secret".into());
        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("bot-secret"));
        assert!(!format!("{config:?}").contains("sk-secret"));
        assert!(!format!("{config:?}").contains("bot-secret"));
    }

    #[test]
    fn telegram_section_parses_and_takes_env_token() {
        let config: AppConfig = toml::from_str(
            r#"
[channels.telegram]
enabled = true
allowed_users = ["alice", "4242"]
chat_id = -1001
"#,
        )
        .unwrap();
        let mut config = config;
        config.apply_env_overrides(|k| (k == "TELEGRAM_BOT_TOKEN").then(|| "123:abc".to_string()));

        let telegram = &config.channels.telegram;
        assert!(telegram.enabled);
        assert_eq!(telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        assert_eq!(telegram.allowed_users, vec!["alice", "4242"]);
        assert_eq!(telegram.chat_id, Some(-1001));
        assert_eq!(telegram.poll_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn telegram_disabled_by_default() {
        let config = AppConfig::default();
        assert!(!config.channels.telegram.enabled);
        assert!(config.tools.browser_enabled);
    }
}
