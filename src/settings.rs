//! Client settings
//!
//! Layered with the `config` crate, lowest priority first:
//! 1. built-in defaults
//! 2. an optional TOML file (`spam-genie.toml` or an explicit path)
//! 3. `SPAM_GENIE_*` environment variables (after `.env` is loaded)

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, SpamGenieError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONFIG_FILE: &str = "spam-genie";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Backend origin; the REST API lives under `/api`
    pub base_url: String,
    /// Sent as `Authorization: Token <api_token>`
    pub api_token: Option<String>,
    /// Sent as the `sessionid` cookie
    pub session_cookie: Option<String>,
    pub timeout_ms: u64,
    /// Wait between generation status polls
    pub poll_interval_ms: u64,
    /// Only files ending with this are uploaded
    pub accepted_extension: String,
    /// Where the current workspace selection is persisted; `~` is expanded
    pub state_path: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            session_cookie: None,
            timeout_ms: 30000,
            poll_interval_ms: 2000,
            accepted_extension: ".eml".to_string(),
            state_path: "~/.spam-genie/state.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, the optional config file and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_ms", defaults.timeout_ms)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms)?
            .set_default("accepted_extension", defaults.accepted_extension)?
            .set_default("state_path", defaults.state_path)?
            .set_default("log_level", defaults.log_level)?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix("SPAM_GENIE"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)?;
        if self.poll_interval_ms == 0 {
            return Err(SpamGenieError::Configuration(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !self.accepted_extension.starts_with('.') {
            return Err(SpamGenieError::Configuration(format!(
                "accepted_extension must start with '.', got '{}'",
                self.accepted_extension
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// State file location with `~` and environment variables expanded
    pub fn state_file(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.state_path).map_err(|e| {
            SpamGenieError::Configuration(format!("Invalid state_path '{}': {}", self.state_path, e))
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        tokio_test::assert_ok!(settings.validate());
        assert_eq!(settings.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "base_url = \"https://genie.example.com\"\npoll_interval_ms = 500\napi_token = \"abc\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.base_url, "https://genie.example.com");
        assert_eq!(settings.poll_interval_ms, 500);
        assert_eq!(settings.api_token.as_deref(), Some("abc"));
        assert_eq!(settings.accepted_extension, ".eml");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.poll_interval_ms = 0;
        tokio_test::assert_err!(settings.validate());

        let mut settings = Settings::default();
        settings.accepted_extension = "eml".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.base_url = "nope".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_state_file_expands_home() {
        let mut settings = Settings::default();
        settings.state_path = "/tmp/spam-genie/state.json".into();
        assert_eq!(
            settings.state_file().unwrap(),
            PathBuf::from("/tmp/spam-genie/state.json")
        );
    }
}
