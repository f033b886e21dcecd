//! Service configuration loaded from JSON.
//! Every field has a default, so an empty object (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::detector::DetectorConfig;
use crate::audio::level::LevelConfig;
use crate::audio::AudioConfig;

/// Logging setup consumed by `init_tracing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "shooter_mic=debug".into(),
            json: false,
        }
    }
}

/// On-disk configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MicConfig {
    pub audio: AudioConfig,
    pub level: LevelConfig,
    pub detector: DetectorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl MicConfig {
    /// Load and validate a JSON config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: MicConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate().map_err(ConfigError::Invalid)?;
        self.detector.validate().map_err(ConfigError::Invalid)?;
        if !self.level.db_offset.is_finite() || self.level.db_offset < 0.0 {
            return Err(ConfigError::Invalid("db_offset must be a finite value >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = MicConfig::from_json("{}").unwrap();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.read_pause_ms, 20);
        assert_eq!(config.detector.quiet_ceiling, 70.0);
        assert_eq!(config.detector.margin, 10.0);
        assert_eq!(config.detector.range, 60.0);
        assert_eq!(config.detector.history_capacity, 20);
        assert_eq!(config.level.db_offset, 1.0);
    }

    #[test]
    fn partial_override() {
        let config = MicConfig::from_json(
            r#"{ "detector": { "margin": 6.5 }, "audio": { "frame_size": 2048 } }"#,
        )
        .unwrap();
        assert_eq!(config.detector.margin, 6.5);
        assert_eq!(config.detector.range, 60.0);
        assert_eq!(config.audio.frame_size, 2048);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            MicConfig::from_json(r#"{ "detector": { "history_capacity": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MicConfig::from_json(r#"{ "audio": { "channels": 2 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MicConfig::from_json(r#"{ "level": { "db_offset": -1.0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unbounded_history() {
        let json = format!(r#"{{ "detector": {{ "history_capacity": {} }} }}"#, usize::MAX);
        assert!(matches!(MicConfig::from_json(&json), Err(ConfigError::Invalid(_))));
        assert!(MicConfig::from_json(r#"{ "detector": { "history_capacity": 65536 } }"#).is_ok());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(MicConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MicConfig::load_from_file(Path::new("/nonexistent/shooter-mic.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
