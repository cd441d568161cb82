// Environment variable loading

use crate::{ConfigError, Result};
use conduit_core::AppConfig;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Overlays `<PREFIX>_*` variables onto an [`AppConfig`]
///
/// | Variable                     | Field                |
/// |------------------------------|----------------------|
/// | `CONDUIT_VALIDATE_RESPONSES` | `validate_responses` |
/// | `CONDUIT_STRIP_HEAD_BODY`    | `strip_head_body`    |
/// | `CONDUIT_DISPATCH_EVENTS`    | `dispatch_events`    |
/// | `CONDUIT_LOG_LEVEL`          | `log.level`          |
/// | `CONDUIT_LOG_FORMAT`         | `log.format`         |
/// | `CONDUIT_LOG_FILE`           | `log.file`           |
/// | `CONDUIT_LOG_FILTER`         | `log.filter`         |
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('_').to_uppercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read a `.env` file into the process environment
    ///
    /// Without a path, a `.env` in the working directory is used if present.
    /// Variables already set are not overridden.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
                Ok(Some(path.to_path_buf()))
            }
            None => Ok(dotenvy::dotenv().ok()),
        }
    }

    /// Variables of the process environment carrying this prefix
    pub fn vars(&self) -> Vec<(String, String)> {
        let prefix = format!("{}_", self.prefix);
        env::vars().filter(|(key, _)| key.starts_with(&prefix)).collect()
    }

    /// Overlay the process environment onto `config`
    pub fn apply_env(&self, config: &mut AppConfig) -> Result<()> {
        self.apply(config, self.vars())
    }

    /// Overlay `vars` onto `config`; variables without the prefix are ignored
    pub fn apply<I>(&self, config: &mut AppConfig, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}_", self.prefix);

        for (key, value) in vars {
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };
            let value = value.trim();

            match name.to_lowercase().as_str() {
                "validate_responses" => config.validate_responses = parse_bool(&key, value)?,
                "strip_head_body" => config.strip_head_body = parse_bool(&key, value)?,
                "dispatch_events" => config.dispatch_events = parse_bool(&key, value)?,
                "log_level" => config.log.level = parse(&key, value)?,
                "log_format" => config.log.format = parse(&key, value)?,
                "log_file" => config.log.file = Some(PathBuf::from(value)),
                "log_filter" => config.log.filter = Some(value.to_string()),
                _ => {
                    warn!(variable = %key, "Ignoring unknown configuration variable");
                    continue;
                }
            }
            debug!(variable = %key, "Applied configuration variable");
        }
        Ok(())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new("CONDUIT")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|reason: String| invalid(key, value, &reason))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
