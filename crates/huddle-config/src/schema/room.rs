//! Client-side room and speaking-indicator configuration.

use serde::{Deserialize, Serialize};

/// How a participant reaches the relay and sets up peer connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Base WebSocket URL of the relay; the room code is appended as a path segment.
    pub relay_url: String,
    /// Name to request after `welcome`. Empty keeps the generated name.
    pub preferred_name: String,
    /// STUN/TURN hints handed to the transport.
    pub ice_servers: Vec<String>,
    /// Relay connect timeout in seconds (valid range: 1-60).
    pub connect_timeout_secs: u32,
    /// How long signals from a not-yet-joined sender are held, in seconds (valid range: 0-30).
    pub signal_grace_secs: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8787".into(),
            preferred_name: String::new(),
            ice_servers: vec!["stun:stun.l.google.com:19302".into()],
            connect_timeout_secs: 15,
            signal_grace_secs: 5,
        }
    }
}

/// Remote speaking indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakingConfig {
    /// Level poll interval in milliseconds (valid range: 20-1000).
    pub poll_interval_ms: u32,
    /// Audio level above which a peer counts as speaking (valid range: 0.0-1.0).
    pub level_threshold: f64,
}

impl Default for SpeakingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            level_threshold: 0.02,
        }
    }
}
