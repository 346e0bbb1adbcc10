//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the relay and client ship with.

mod audio;
mod relay;
mod room;
mod system;

pub use audio::*;
pub use relay::*;
pub use room::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration shared by the relay binary and room clients.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct HuddleConfig {
    pub relay: RelayConfig,
    pub room: RoomConfig,
    pub speaking: SpeakingConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
