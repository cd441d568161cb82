// Application configuration

use crate::logging::{LogConfig, LogFormat, LogLevel, LogOutput};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Behaviour switches for an [`App`](crate::App) and its dispatcher
///
/// Every field has a default, so a partial TOML or JSON document is enough:
///
/// ```
/// use conduit_core::AppConfig;
///
/// let config: AppConfig = serde_json::from_str(r#"{ "strip_head_body": false }"#).unwrap();
/// assert!(!config.strip_head_body);
/// assert!(config.validate_responses);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Turn error statuses into errors after every step
    pub validate_responses: bool,
    /// Drop the body of responses to `HEAD` requests
    pub strip_head_body: bool,
    /// Fire `before.dispatch`, `after.dispatch` and `done.dispatch`
    pub dispatch_events: bool,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            validate_responses: true,
            strip_head_body: true,
            dispatch_events: true,
            log: LogSettings::default(),
        }
    }
}

/// Serializable subset of [`LogConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Log to this file instead of stdout
    pub file: Option<PathBuf>,
    pub filter: Option<String>,
}

impl From<&LogSettings> for LogConfig {
    fn from(settings: &LogSettings) -> Self {
        let mut config = LogConfig::new()
            .level(settings.level)
            .format(settings.format);
        if let Some(path) = &settings.file {
            config = config.output(LogOutput::File(path.clone()));
        }
        if let Some(filter) = &settings.filter {
            config = config.with_env_filter(filter.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate_responses);
        assert!(config.strip_head_body);
        assert!(config.dispatch_events);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_document() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "dispatch_events": false, "log": { "level": "debug" } }"#)
                .unwrap();
        assert!(!config.dispatch_events);
        assert!(config.validate_responses);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_log_settings_conversion() {
        let settings = LogSettings {
            level: LogLevel::Warn,
            format: LogFormat::Plain,
            file: Some(PathBuf::from("conduit.log")),
            filter: None,
        };
        let config = LogConfig::from(&settings);
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.output, LogOutput::File(PathBuf::from("conduit.log")));
    }
}
