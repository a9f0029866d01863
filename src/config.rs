//! Runtime configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. Lookup order: an explicit path, then
//! `<config dir>/pagepilot/config.toml`, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub executor: ExecutorConfig,
    pub detector: DetectorConfig,
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pagepilot").join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
    /// Pause after a successful action so the page can react.
    pub settle_delay_ms: u64,
    pub chat_timeout_ms: u64,
    /// Number of recent history entries sent with each chat call.
    pub history_window: usize,
    /// Hard cap on retained history entries.
    pub max_history: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            settle_delay_ms: 500,
            chat_timeout_ms: 18_000,
            history_window: 20,
            max_history: 60,
        }
    }
}

impl AgentConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wait after `scrollIntoView` before reading coordinates.
    pub scroll_settle_ms: u64,
    /// Delay between repeated clicks.
    pub click_interval_ms: u64,
    /// The document must exceed the viewport by this many pixels before the
    /// window is scrolled instead of an inner container.
    pub document_scroll_margin: f64,
    /// Default scroll distance as a fraction of the visible height.
    pub scroll_ratio: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            scroll_settle_ms: 150,
            click_interval_ms: 100,
            document_scroll_margin: 50.0,
            scroll_ratio: 0.8,
        }
    }
}

impl ExecutorConfig {
    /// No waits at all; used by tests against the in-memory page.
    pub fn immediate() -> Self {
        Self {
            scroll_settle_ms: 0,
            click_interval_ms: 0,
            ..Self::default()
        }
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn click_interval(&self) -> Duration {
        Duration::from_millis(self.click_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub max_inventory_chars: usize,
    pub max_depth: usize,
    pub max_text_len: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_inventory_chars: 12_000,
            max_depth: 64,
            max_text_len: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Debugging endpoint of an already running Chrome.
    pub attach_url: Option<String>,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub start_url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            attach_url: Some("http://127.0.0.1:9222".to_string()),
            headless: false,
            chrome_path: None,
            start_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.agent.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.agent.chat_timeout(), Duration::from_secs(18));
        assert_eq!(config.detector.max_depth, 64);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 5\n\n[llm]\nmodel = \"llama3\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.settle_delay_ms, 500);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = \"many\"").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/pagepilot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
