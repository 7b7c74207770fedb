//! Configuration for the integration layer
//!
//! One `ChatConfig` covers the backend, the timeline delays and the audio
//! cue. It can come from defaults, a TOML file and `HOLDLINE_*` environment
//! variables, in that order of precedence from lowest to highest.

use crate::audio::CueConfig;
use crate::orchestrator::TimelineConfig;
use crate::{HoldlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_API_URL: &str = "HOLDLINE_API_URL";
pub const ENV_CLIP: &str = "HOLDLINE_CLIP";
pub const ENV_CONFIG: &str = "HOLDLINE_CONFIG";
pub const ENV_SESSION_FILE: &str = "HOLDLINE_SESSION_FILE";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the agent backend
    pub api_url: String,

    /// Per-request timeout for the backend
    pub request_timeout_ms: u64,

    /// Where the session id is persisted; the platform data dir if unset
    pub session_file: Option<PathBuf>,

    /// Capacity of the UI event channel
    pub event_buffer_size: usize,

    /// Agent messages shown when the chat opens
    pub greeting: Vec<String>,

    /// Whether to start the audio cue at all
    pub enable_audio: bool,

    pub timeline: TimelineConfig,

    pub audio: CueConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
            session_file: None,
            event_buffer_size: 100,
            greeting: Vec::new(),
            enable_audio: true,
            timeline: TimelineConfig::default(),
            audio: CueConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_clip(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio.clip_path = Some(path.into());
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    pub fn with_greeting<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.greeting = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeline(mut self, timeline: TimelineConfig) -> Self {
        self.timeline = timeline;
        self
    }

    /// Text-only mode
    pub fn without_audio(mut self) -> Self {
        self.enable_audio = false;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&raw)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| HoldlineError::ConfigError(e.to_string()))
    }

    /// Defaults, then the file named by `HOLDLINE_CONFIG`, then the
    /// individual variable overrides
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(clip) = lookup(ENV_CLIP) {
            config.audio.clip_path = Some(PathBuf::from(clip));
        }
        if let Some(file) = lookup(ENV_SESSION_FILE) {
            config.session_file = Some(PathBuf::from(file));
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(HoldlineError::ConfigError(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(HoldlineError::ConfigError(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(HoldlineError::ConfigError(
                "event_buffer_size must be greater than 0".into(),
            ));
        }
        self.audio.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.timeline.hold_duration_ms, 10_000);
        assert_eq!(config.audio.gain_ceiling, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ChatConfig::default()
            .with_api_url("https://example.org")
            .with_clip("/tmp/hold.wav")
            .without_audio();

        assert_eq!(config.api_url, "https://example.org");
        assert_eq!(config.audio.clip_path, Some(PathBuf::from("/tmp/hold.wav")));
        assert!(!config.enable_audio);
    }

    #[test]
    fn test_partial_toml() {
        let config = ChatConfig::from_toml(
            r#"
            api_url = "https://chat.example.org"

            [timeline]
            hold_duration_ms = 2000

            [audio]
            transfer_fade_ms = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://chat.example.org");
        assert_eq!(config.timeline.hold_duration_ms, 2000);
        assert_eq!(config.timeline.transfer_duration_ms, 25_000);
        assert_eq!(config.audio.transfer_fade_ms, 400);
        assert_eq!(config.audio.waiting_fade_ms, 1000);
        assert!(config.greeting.is_empty());
    }

    #[test]
    fn test_greeting_from_toml() {
        let config = ChatConfig::from_toml(
            r#"
            greeting = ["Benvenuto!", "Vuoi prenotare un tavolo?"]
            "#,
        )
        .unwrap();
        assert_eq!(config.greeting, vec!["Benvenuto!", "Vuoi prenotare un tavolo?"]);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            ChatConfig::from_toml("api_url = 3"),
            Err(HoldlineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("holdline.toml");
        std::fs::write(&path, "api_url = \"http://from-file:9000\"\nrequest_timeout_ms = 5000\n")
            .unwrap();

        let vars: HashMap<&str, String> = [
            (ENV_CONFIG, path.display().to_string()),
            (ENV_API_URL, "http://from-env:8080".to_string()),
            (ENV_SESSION_FILE, "/tmp/session.json".to_string()),
        ]
        .into_iter()
        .collect();

        let config = ChatConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.api_url, "http://from-env:8080");
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/session.json")));
        assert!(config.audio.clip_path.is_none());
    }

    #[test]
    fn test_validation() {
        assert!(ChatConfig::default().with_api_url("localhost").validate().is_err());

        let config = ChatConfig {
            request_timeout_ms: 0,
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ChatConfig {
            event_buffer_size: 0,
            ..ChatConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
