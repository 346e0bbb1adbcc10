//! Configuration for the huddle relay and room clients.
//!
//! One TOML file with a section per component. Every field has a default,
//! so a file holding only `[room] preferred_name = "river"` is complete.
//! The file is found at `$HUDDLE_CONFIG`, else the platform config directory.
//!
//! ```rust,no_run
//! let config = huddle_config::load_config()?;
//! println!("relay at {}", config.room.relay_url);
//! # Ok::<(), huddle_common::ConfigError>(())
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{HuddleConfig, CONFIG_SCHEMA_VERSION};
pub use toml_loader::{load_default, load_from_path, parse_config, CONFIG_ENV};

use huddle_common::ConfigError;

/// Load the default file (seeding it on first run) and reject it if any
/// value is out of range.
pub fn load_config() -> Result<HuddleConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Pretty JSON dump of the effective config, for `--print-config` style
/// diagnostics.
pub fn config_to_json(config: &HuddleConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
