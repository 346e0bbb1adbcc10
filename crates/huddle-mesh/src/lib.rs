//! Full-mesh room client: relay signaling, per-peer negotiation, the
//! screen-share overlay, and remote speaking indicators.
//!
//! Media itself is carried by a host-provided [`MediaBackend`]; this crate
//! only decides who connects to whom and when to (re)negotiate.

pub mod level;
pub mod peer;
pub mod room;
pub mod screen_share;
pub mod signaling;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use level::{LevelPoller, LevelUpdate, SpeakingDetector};
pub use peer::{PeerSession, PeerState};
pub use room::{
    join, PeerRecord, RoomCommand, RoomEvent, RoomHandle, RoomSession, RoomSettings, RoomSnapshot,
};
pub use screen_share::{ScreenSharer, ScreenViewer, ShareEdge};
pub use signaling::SignalingClient;
pub use transport::{
    ConnectionConfig, ConnectionState, Direction, LevelMeter, MediaBackend, MediaConnection,
    ScreenCapture, SenderId, SignalingState, TransportEvent,
};
