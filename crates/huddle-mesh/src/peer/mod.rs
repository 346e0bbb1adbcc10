//! One mesh edge: the media connection to a single remote participant.

mod session;
mod types;

pub use session::PeerSession;
pub use types::PeerState;
