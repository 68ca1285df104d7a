use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use veil::Redact;

use crate::dispatch::Action;

/// Upper bound on the configuration file size. The file is tiny; anything
/// larger is almost certainly not a pandero configuration.
const MAX_CONFIG_SIZE: u64 = 64 * 1024;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("reading configuration failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration format is invalid: {0}")]
    Format(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration.
///
/// Action bindings come from the closed set of [`Action`] names; anything
/// else fails deserialization, so a misbound gesture is a startup error
/// rather than a surprise at event time.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// When false, the event monitor is not constructed at all.
    pub event_support_enabled: bool,

    /// Time budget for each gesture recognizer, in seconds.
    pub double_click_interval: f64,

    pub on_pause_resume_click: Action,
    pub on_pause_resume_pause_click: Action,
    pub on_pause_previous_click: Action,
    pub on_pause_next_click: Action,

    /// Lifetime of the cached station list, in seconds.
    pub station_cache_ttl: u64,

    pub credentials: Credentials,
}

/// Pandora gateway credentials.
#[derive(Clone, Redact, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    pub partner_id: String,
    pub user_id: String,
    #[redact]
    pub auth_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_support_enabled: true,
            double_click_interval: 0.5,
            on_pause_resume_click: Action::ThumbsUp,
            on_pause_resume_pause_click: Action::DeleteStation,
            on_pause_previous_click: Action::Sleep,
            on_pause_next_click: Action::ThumbsDown,
            station_cache_ttl: 30 * 60,
            credentials: Credentials::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file_size = fs::metadata(path)?.len();
        if file_size > MAX_CONFIG_SIZE {
            return Err(Error::Invalid(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses and validates the configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The per-sequence time budget as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.double_click_interval)
    }

    /// The station-list cache lifetime as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.station_cache_ttl)
    }

    fn validate(&self) -> Result<()> {
        if !self.double_click_interval.is_finite() || self.double_click_interval <= 0.0 {
            return Err(Error::Invalid(format!(
                "double_click_interval must be positive, not {}",
                self.double_click_interval
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.event_support_enabled);
        assert_eq!(config.double_click_interval, 0.5);
        assert_eq!(config.on_pause_resume_click, Action::ThumbsUp);
        assert_eq!(config.on_pause_next_click, Action::ThumbsDown);
        assert_eq!(config.on_pause_previous_click, Action::Sleep);
        assert_eq!(config.on_pause_resume_pause_click, Action::DeleteStation);
    }

    #[test]
    fn parses_bindings_and_credentials() {
        let config = Config::from_toml(
            r#"
            double_click_interval = 0.25
            on_pause_resume_click = "add_song_bookmark"

            [credentials]
            partner_id = "42"
            user_id = "1234"
            auth_token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.double_click_interval, 0.25);
        assert_eq!(config.on_pause_resume_click, Action::AddSongBookmark);
        assert_eq!(config.credentials.user_id, "1234");
    }

    #[test]
    fn rejects_unknown_action() {
        let result = Config::from_toml(r#"on_pause_resume_click = "explode""#);
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn rejects_non_positive_interval() {
        let result = Config::from_toml("double_click_interval = 0.0");
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn redacts_auth_token_in_debug() {
        let credentials = Credentials {
            partner_id: "42".to_string(),
            user_id: "1234".to_string(),
            auth_token: "super-secret".to_string(),
        };
        let debugged = format!("{credentials:?}");
        assert!(!debugged.contains("super-secret"));
    }
}
