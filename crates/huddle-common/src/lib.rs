pub mod errors;
pub mod id;
pub mod media;
pub mod protocol;

pub use errors::{AudioError, ConfigError, HuddleError, NegotiationError, SignalingError};
pub use id::{new_id, ConnectionId, PeerId};
pub use media::{MediaTrack, TrackKind};
pub use protocol::{
    ClientMessage, IceCandidate, RelayMessage, RosterEntry, SdpType, SessionDescription,
};

pub type Result<T> = std::result::Result<T, HuddleError>;
