//! Short-lived buffer for mesh signals that outrun their sender's `join`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use huddle_common::{PeerId, RelayMessage};

pub struct PendingSignals {
    grace: Duration,
    entries: HashMap<PeerId, Vec<(Instant, RelayMessage)>>,
}

impl PendingSignals {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            entries: HashMap::new(),
        }
    }

    /// Hold `msg` from `from`. Dropped immediately when the grace period is zero.
    pub fn push(&mut self, from: &str, msg: RelayMessage, now: Instant) {
        if self.grace.is_zero() {
            return;
        }
        self.entries
            .entry(from.to_string())
            .or_default()
            .push((now, msg));
    }

    /// Remove and return everything still fresh from `from`, oldest first.
    pub fn take(&mut self, from: &str, now: Instant) -> Vec<RelayMessage> {
        let grace = self.grace;
        self.entries
            .remove(from)
            .unwrap_or_default()
            .into_iter()
            .filter(|(at, _)| now.duration_since(*at) <= grace)
            .map(|(_, msg)| msg)
            .collect()
    }

    pub fn discard(&mut self, from: &str) {
        self.entries.remove(from);
    }

    /// Drop everything older than the grace period. Returns how many went.
    pub fn expire(&mut self, now: Instant) -> usize {
        let grace = self.grace;
        let mut dropped = 0;
        self.entries.retain(|_, msgs| {
            let before = msgs.len();
            msgs.retain(|(at, _)| now.duration_since(*at) <= grace);
            dropped += before - msgs.len();
            !msgs.is_empty()
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
