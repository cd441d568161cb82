//! Configuration loading for Conduit
//!
//! Builds a [`conduit_core::AppConfig`] from a TOML, JSON or `.env` style
//! file and then overlays `CONDUIT_*` environment variables.
//!
//! ```no_run
//! use conduit_config::load_config;
//! use conduit_core::App;
//!
//! let config = load_config(Some("conduit.toml")).unwrap();
//! let app = App::with_config(config);
//! ```

pub mod env;
pub mod error;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use conduit_core::AppConfig;
use std::path::Path;
use tracing::info;

/// Load `path` (if given) and overlay the process environment
pub fn load_config(path: Option<impl AsRef<Path>>) -> Result<AppConfig> {
    let env = EnvLoader::default();

    let mut config = match path {
        Some(path) => ConfigLoader::auto(path.as_ref())?.load_file(path.as_ref())?,
        None => AppConfig::default(),
    };
    env.apply_env(&mut config)?;

    info!(
        validate_responses = config.validate_responses,
        strip_head_body = config.strip_head_body,
        dispatch_events = config.dispatch_events,
        "Configuration loaded"
    );
    Ok(config)
}

/// Defaults overlaid with the process environment, after reading `.env`
pub fn from_env() -> Result<AppConfig> {
    let env = EnvLoader::default();
    env.load_dotenv(None)?;

    let mut config = AppConfig::default();
    env.apply_env(&mut config)?;
    Ok(config)
}
