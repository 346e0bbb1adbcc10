use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relay-assigned participant identifier, as it appears on the wire.
pub type PeerId = String;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one transport connection for its whole life. Never reused, so
/// events from a replaced connection can be told apart from its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
