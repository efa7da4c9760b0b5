use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api_url`
pub const API_URL_ENV: &str = "BOOKING_CONSOLE_API_URL";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the console backend
    pub api_url: String,

    /// Timeout for booking fetches, and connect timeout for chat streams
    pub request_timeout_secs: u64,

    /// First assistant message shown in the chat panel
    pub welcome_message: String,

    /// Where the TUI writes its log; defaults to `console.log` in the config directory
    pub log_file: Option<PathBuf>,

    /// UI preferences
    pub ui: UiConfig,

    /// Offline demo backend
    pub demo: DemoConfig,
}

/// UI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Width share of the bookings panel, in percent
    pub booking_panel_percent: u16,
    pub tick_rate_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Pause between streamed words
    pub token_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            welcome_message: "Welcome to Great Hotel Booking! How can I help you?".to_string(),
            log_file: None,
            ui: UiConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            booking_panel_percent: 70,
            tick_rate_ms: 100,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig { token_delay_ms: 40 }
    }
}

impl Config {
    /// Directory holding the config file and the log
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".booking-console"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load `path` (if it exists) and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with the environment supplied by `lookup`
    pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`, creating its directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.demo.token_delay_ms)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?.join("console.log")),
        }
    }
}
