//! Noise suppression and voice gate configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Route the microphone through the denoise + voice gate pipeline.
    pub noise_suppression: bool,
    /// Voice probability at or above which a frame opens the gate (valid range: 0.5-0.98).
    pub vad_threshold: f64,
    /// Frames the gate stays open after the last voiced frame (valid range: 1-100).
    pub hold_frames: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            noise_suppression: false,
            vad_threshold: 0.85,
            hold_frames: 10,
        }
    }
}
