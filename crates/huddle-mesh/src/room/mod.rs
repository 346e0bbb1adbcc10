//! Room session orchestration.
//!
//! One [`RoomSession`] per joined room. It turns relay traffic into peer
//! sessions and screen-share edges, applies local media changes to all of
//! them, and reports state to the UI as [`RoomEvent`]s.

mod manager;
mod pending;
mod types;

pub use manager::{join, RoomHandle, RoomSession};
pub use pending::PendingSignals;
pub use types::{PeerRecord, RoomCommand, RoomEvent, RoomSettings, RoomSnapshot};
