// Configuration file loaders

use crate::env::EnvLoader;
use crate::{ConfigError, Result};
use conduit_core::AppConfig;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines using the `CONDUIT_` variable names
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Format of `path`, from its extension or a `.env` file name
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.file_name().and_then(|name| name.to_str()) == Some(".env") {
            return Ok(FileFormat::Env);
        }
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }
}

/// Parses configuration documents into an [`AppConfig`]
pub struct ConfigLoader {
    format: FileFormat,
    env: EnvLoader,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self {
            format,
            env: EnvLoader::default(),
        }
    }

    /// Pick the format from the file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(FileFormat::from_path(path.as_ref())?))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), format = ?self.format, "Loading configuration file");
        self.parse(&content)
    }

    /// Parse a document; keys it leaves out keep their defaults
    pub fn parse(&self, content: &str) -> Result<AppConfig> {
        match self.format {
            FileFormat::Json => from_value(self.parse_json(content)?),
            FileFormat::Toml => from_value(self.parse_toml(content)?),
            FileFormat::Env => {
                let mut config = AppConfig::default();
                self.env.apply(&mut config, self.parse_env(content)?)?;
                Ok(config)
            }
        }
    }

    fn parse_json(&self, content: &str) -> Result<Value> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))
    }

    fn parse_toml(&self, content: &str) -> Result<Value> {
        let value: toml::Value = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        serde_json::to_value(value)
            .map_err(|e| ConfigError::ParseError(format!("TOML to JSON conversion error: {}", e)))
    }

    fn parse_env(&self, content: &str) -> Result<Vec<(String, String)>> {
        dotenvy::from_read_iter(content.as_bytes())
            .map(|item| item.map_err(|e| ConfigError::ParseError(format!("env parse error: {}", e))))
            .collect()
    }
}

fn from_value(value: Value) -> Result<AppConfig> {
    serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::logging::{LogFormat, LogLevel};

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let config = loader
            .parse(r#"{"validate_responses": false, "log": {"format": "pretty"}}"#)
            .unwrap();

        assert!(!config.validate_responses);
        assert!(config.strip_head_body);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let config = loader
            .parse(
                r#"
                dispatch_events = false

                [log]
                level = "trace"
                filter = "conduit_core=trace"
            "#,
            )
            .unwrap();

        assert!(!config.dispatch_events);
        assert_eq!(config.log.level, LogLevel::Trace);
        assert_eq!(config.log.filter.as_deref(), Some("conduit_core=trace"));
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let config = loader
            .parse(
                r#"
# Comment
CONDUIT_STRIP_HEAD_BODY=false
CONDUIT_LOG_LEVEL="warn"
UNRELATED=1
"#,
            )
            .unwrap();

        assert!(!config.strip_head_body);
        assert_eq!(config.log.level, LogLevel::Warn);
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let loader = ConfigLoader::new(FileFormat::Json);
        assert!(matches!(
            loader.parse(r#"{"validate_responses": "sometimes"}"#),
            Err(ConfigError::DeserializationError(_))
        ));
        assert!(matches!(
            loader.parse("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("toml"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert_eq!(
            FileFormat::from_path(Path::new("config/.env")).unwrap(),
            FileFormat::Env
        );
        assert!(matches!(
            ConfigLoader::auto("conduit.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
