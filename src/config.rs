use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::prompts::PERSONA_PROMPT;

/// Environment variable consulted when no API key is set in the config file
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for OpenRouter
    pub openrouter_api_key: Option<String>,

    /// Model identifier sent with every request
    pub model: String,

    /// Base URL of the chat-completions API
    pub base_url: String,

    /// Sent as `HTTP-Referer` to identify the calling app
    pub referer: String,

    /// Sent as `X-Title`
    pub title: String,

    /// Replaces the built-in persona prompt when set
    pub system_prompt: Option<String>,

    /// AskAnsh home directory
    #[serde(skip)]
    pub home: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            openrouter_api_key: None,
            model: "deepseek/deepseek-r1-0528:free".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            referer: "http://localhost".to_string(),
            title: "AskAnsh".to_string(),
            system_prompt: None,
            home: home.join(".askansh"),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".askansh").join("config.toml"))
    }

    /// Load configuration from `~/.askansh/config.toml`, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        if let Some(parent) = path.parent() {
            config.home = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Get API key from config or environment
    pub fn api_key(&self) -> Option<String> {
        self.openrouter_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
    }

    /// The system prompt prepended to every request
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(PERSONA_PROMPT)
    }

    /// Default log file location
    pub fn log_path(&self) -> PathBuf {
        self.home.join("askansh.log")
    }

    /// Full URL of the chat-completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
