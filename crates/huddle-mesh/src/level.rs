//! Polled speaking indicator for remote audio.

use std::time::Duration;

use huddle_common::PeerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::transport::LevelMeter;

#[derive(Debug, Clone, PartialEq)]
pub struct LevelUpdate {
    pub peer_id: PeerId,
    pub level: f32,
    pub speaking: bool,
}

/// Level above which a peer counts as speaking.
#[derive(Debug, Clone, Copy)]
pub struct SpeakingDetector {
    threshold: f32,
}

impl SpeakingDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn is_speaking(&self, level: f32) -> bool {
        level > self.threshold
    }
}

/// A running poll task. Aborted on drop.
pub struct LevelPoller {
    handle: JoinHandle<()>,
}

impl LevelPoller {
    pub fn spawn(
        peer_id: PeerId,
        mut meter: Box<dyn LevelMeter>,
        interval: Duration,
        detector: SpeakingDetector,
        tx: mpsc::UnboundedSender<LevelUpdate>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let level = meter.level();
                let update = LevelUpdate {
                    peer_id: peer_id.clone(),
                    level,
                    speaking: detector.is_speaking(level),
                };
                if tx.send(update).is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for LevelPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct SharedMeter(Arc<AtomicU32>);

    impl LevelMeter for SharedMeter {
        fn level(&mut self) -> f32 {
            f32::from_bits(self.0.load(Ordering::Relaxed))
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        let detector = SpeakingDetector::new(0.02);
        assert!(!detector.is_speaking(0.0));
        assert!(!detector.is_speaking(0.02));
        assert!(detector.is_speaking(0.05));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_reports_each_tick() {
        let level = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _poller = LevelPoller::spawn(
            "p1".into(),
            Box::new(SharedMeter(level.clone())),
            Duration::from_millis(100),
            SpeakingDetector::new(0.02),
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert!(!first.speaking);

        level.store(0.3f32.to_bits(), Ordering::Relaxed);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.peer_id, "p1");
        assert!(second.speaking);
        assert!((second.level - 0.3).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_poller_stops_updates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = LevelPoller::spawn(
            "p1".into(),
            Box::new(SharedMeter(Arc::new(AtomicU32::new(0)))),
            Duration::from_millis(100),
            SpeakingDetector::new(0.02),
            tx,
        );
        rx.recv().await.unwrap();
        drop(poller);
        // The aborted task drops its sender, closing the channel.
        while rx.recv().await.is_some() {}
    }
}
