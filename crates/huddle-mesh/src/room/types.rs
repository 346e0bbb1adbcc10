//! Records, events, commands, and settings for a room session.

use std::time::Duration;

use huddle_audio::GateConfig;
use huddle_common::{MediaTrack, PeerId};
use huddle_config::HuddleConfig;
use tokio::sync::oneshot;

use crate::transport::{ConnectionState, ScreenCapture};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What we know about one remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub id: PeerId,
    pub display_name: String,
    pub muted: bool,
    pub speaking: bool,
    pub audio_level: f32,
    pub camera_enabled: bool,
    pub camera_stream: Option<MediaTrack>,
    pub screen_sharing: bool,
    /// Present only while subscribed and the sharer is active.
    pub screen_stream: Option<MediaTrack>,
    pub screen_subscribed: bool,
}

impl PeerRecord {
    pub fn new(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            muted: false,
            speaking: false,
            audio_level: 0.0,
            camera_enabled: false,
            camera_stream: None,
            screen_sharing: false,
            screen_stream: None,
            screen_subscribed: false,
        }
    }

    pub(crate) fn clear_screen(&mut self) {
        self.screen_sharing = false;
        self.screen_stream = None;
        self.screen_subscribed = false;
    }
}

/// Point-in-time copy of the session for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub self_id: Option<PeerId>,
    pub self_name: String,
    pub peers: Vec<PeerRecord>,
    pub muted: bool,
    pub camera_enabled: bool,
    pub sharing_screen: bool,
    pub noise_suppression: bool,
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub ice_servers: Vec<String>,
    pub preferred_name: String,
    /// How long mesh signals from unknown senders are kept for replay.
    pub signal_grace: Duration,
    pub level_interval: Duration,
    pub level_threshold: f32,
    pub gate: GateConfig,
}

impl RoomSettings {
    pub fn from_config(config: &HuddleConfig) -> Self {
        Self {
            ice_servers: config.room.ice_servers.clone(),
            preferred_name: config.room.preferred_name.trim().to_string(),
            signal_grace: Duration::from_secs(u64::from(config.room.signal_grace_secs)),
            level_interval: Duration::from_millis(u64::from(config.speaking.poll_interval_ms)),
            level_threshold: config.speaking.level_threshold as f32,
            gate: GateConfig {
                threshold: config.audio.vad_threshold as f32,
                hold_frames: config.audio.hold_frames,
            },
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from_config(&HuddleConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the room session for the UI.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Joined {
        peer_id: PeerId,
        name: String,
    },
    SelfRenamed {
        name: String,
    },
    PeerJoined {
        peer_id: PeerId,
        name: String,
    },
    PeerLeft {
        peer_id: PeerId,
        name: String,
    },
    PeerRenamed {
        peer_id: PeerId,
        name: String,
    },
    MuteChanged {
        peer_id: PeerId,
        muted: bool,
    },
    CameraChanged {
        peer_id: PeerId,
        enabled: bool,
    },
    CameraStream {
        peer_id: PeerId,
        track: MediaTrack,
    },
    SpeakingChanged {
        peer_id: PeerId,
        speaking: bool,
    },
    ScreenShareStarted {
        peer_id: PeerId,
    },
    ScreenShareStopped {
        peer_id: PeerId,
    },
    ScreenStream {
        peer_id: PeerId,
        track: MediaTrack,
    },
    /// Our own capture ended outside the app.
    LocalScreenShareEnded,
    ConnectionStateChanged {
        peer_id: PeerId,
        state: ConnectionState,
    },
    NegotiationFailed {
        peer_id: PeerId,
        error: String,
    },
    NoiseSuppressionChanged {
        enabled: bool,
        strategy: &'static str,
    },
    /// The relay connection is gone; the session has shut down.
    Disconnected,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub enum RoomCommand {
    SetMuted(bool),
    /// `Some` starts sending the track as camera video, `None` stops.
    SetCamera(Option<MediaTrack>),
    SwitchAudioDevice(MediaTrack),
    SetNoiseSuppression(bool),
    SetVadThreshold(f32),
    StartScreenShare(Box<dyn ScreenCapture>),
    StopScreenShare,
    Subscribe(PeerId),
    Unsubscribe(PeerId),
    Rename(String),
    Snapshot(oneshot::Sender<RoomSnapshot>),
    Leave,
}
