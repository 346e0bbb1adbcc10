//! Lifecycle state of a peer session.

use std::fmt;

/// `New -> Negotiating -> Connected -> Closed`; `Closed` is reachable from
/// any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    #[default]
    New,
    Negotiating,
    Connected,
    Closed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerState::New => "new",
            PeerState::Negotiating => "negotiating",
            PeerState::Connected => "connected",
            PeerState::Closed => "closed",
        };
        f.write_str(s)
    }
}
