//! Relay server configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay binds to.
    pub host: String,
    pub port: u16,
    /// Longest display name accepted from `rename-request` (valid range: 8-64).
    pub max_name_len: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8787,
            max_name_len: 24,
        }
    }
}
