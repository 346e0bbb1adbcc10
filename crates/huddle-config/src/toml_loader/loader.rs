//! Reading and parsing the TOML file.

use std::path::Path;

use huddle_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::HuddleConfig;
use crate::validation;

/// Parse TOML text. Missing keys and sections take their defaults.
pub fn parse_config(text: &str) -> Result<HuddleConfig, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}

/// Load `path`. Out-of-range values are logged, not rejected; callers
/// that need a strict check run `validation::validate` themselves.
pub fn load_from_path(path: &Path) -> Result<HuddleConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let config = parse_config(&text)?;
    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "{e}");
    }
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load from [`default_config_path`], seeding the template on first run.
pub fn load_default() -> Result<HuddleConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(HuddleConfig::default())
        }
        other => other,
    }
}
