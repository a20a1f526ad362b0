//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tchat_ai::providers::ollama::{DEFAULT_HOST, HOST_ENV_VAR};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant";
pub const DEFAULT_MAX_MESSAGES: i64 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for tchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preferred model; the first available model is used when unset or missing
    pub model: Option<String>,
    /// System prompt sent with every request
    pub system_prompt: Option<String>,
    /// How many messages of history to send along
    pub max_messages: Option<i64>,
    /// debug, info, warn or error
    pub log_level: Option<String>,
    /// Ollama server address (overrides OLLAMA_HOST)
    pub ollama_host: Option<String>,
    /// Terminal colors
    #[serde(default)]
    pub colors: ColorConfig,
}

/// Color names for each kind of terminal output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub prompt: Option<String>,
    pub info: Option<String>,
    pub error: Option<String>,
    pub output: Option<String>,
}

impl Config {
    /// Get the application directory (`TCHAT_APPDIR` or `~/.tchat`)
    pub fn app_dir() -> PathBuf {
        resolve_app_dir(std::env::var("TCHAT_APPDIR").ok(), dirs::home_dir())
    }

    /// Get the config file path
    pub fn config_path(app_dir: &Path) -> PathBuf {
        app_dir.join("config.toml")
    }

    /// Load config from the app directory, falling back to defaults
    pub fn load(app_dir: &Path) -> Self {
        Self::load_from(&Self::config_path(app_dir))
    }

    fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self, app_dir: &Path) -> std::io::Result<()> {
        fs::create_dir_all(app_dir)?;
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(Self::config_path(app_dir), content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init(app_dir: &Path) -> std::io::Result<PathBuf> {
        let path = Self::config_path(app_dir);
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: None,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_messages: Some(DEFAULT_MAX_MESSAGES),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            ollama_host: None,
            colors: ColorConfig {
                prompt: Some("cyan".into()),
                info: Some("green".into()),
                error: Some("red".into()),
                output: Some("green".into()),
            },
        };

        default_config.save(app_dir)?;
        Ok(path)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn max_messages(&self) -> i64 {
        self.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Server address: `--host` flag, then config, then `OLLAMA_HOST`, then the default
    pub fn ollama_host(&self, flag: Option<&str>) -> String {
        resolve_host(
            flag,
            self.ollama_host.as_deref(),
            std::env::var(HOST_ENV_VAR).ok().as_deref(),
        )
    }
}

fn resolve_host(flag: Option<&str>, config: Option<&str>, env: Option<&str>) -> String {
    [flag, config, env]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOST)
        .to_string()
}

fn resolve_app_dir(env_override: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_override.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    home.unwrap_or_else(|| PathBuf::from(".")).join(".tchat")
}

/// Example config file content
pub fn example_config() -> &'static str {
    r#"# tchat configuration file
# Location: ~/.tchat/config.toml (or $TCHAT_APPDIR/config.toml)

# Preferred model (must be installed in Ollama)
# model = "llama3.2"

# System prompt sent with every request
system_prompt = "You are a helpful assistant"

# Messages of history sent with each request
max_messages = 5

# Log level: debug, info, warn, error
log_level = "info"

# Ollama server (defaults to $OLLAMA_HOST, then http://localhost:11434)
# ollama_host = "http://localhost:11434"

# Colors: black, red, green, yellow, blue, magenta, cyan, white
[colors]
prompt = "cyan"
info = "green"
error = "red"
output = "green"
"#
}
