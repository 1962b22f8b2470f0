use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Openrouter,
    Ollama,
    #[default]
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub source_channel_id: String,
    pub report_channel_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModerationConfig {
    /// Leading tokens of a completion reply that count as a "yes" verdict.
    #[serde(default = "default_affirmative_prefixes")]
    pub affirmative_prefixes: Vec<String>,
    /// Pause between scanned messages, to stay under the completion API's
    /// rate limit.
    #[serde(default = "default_classify_pause_ms")]
    pub classify_pause_ms: u64,
}

impl ModerationConfig {
    pub fn classify_pause(&self) -> Duration {
        Duration::from_millis(self.classify_pause_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default = "default_llm_config")]
    pub llm: LlmConfig,
    #[serde(default = "default_moderation_config")]
    pub moderation: ModerationConfig,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    64
}

fn default_system_prompt() -> String {
    "You are a strict moderator.".to_string()
}

fn default_affirmative_prefixes() -> Vec<String> {
    vec!["はい".to_string()]
}

fn default_classify_pause_ms() -> u64 {
    1200
}

fn default_llm_config() -> LlmConfig {
    LlmConfig {
        provider: LlmProvider::default(),
        model: default_model(),
        base_url: String::new(),
        api_key: String::new(),
        max_tokens: default_max_tokens(),
        system_prompt: default_system_prompt(),
    }
}

fn default_moderation_config() -> ModerationConfig {
    ModerationConfig {
        affirmative_prefixes: default_affirmative_prefixes(),
        classify_pause_ms: default_classify_pause_ms(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
