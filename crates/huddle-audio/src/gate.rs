//! Voice activity gate with hold-over and a shared monitor.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub const DEFAULT_THRESHOLD: f32 = 0.85;
pub const MIN_THRESHOLD: f32 = 0.5;
pub const MAX_THRESHOLD: f32 = 0.98;
pub const DEFAULT_HOLD_FRAMES: u32 = 10;

/// Share of the previous smoothed value kept on each frame.
const SMOOTHING: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    pub threshold: f32,
    pub hold_frames: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            hold_frames: DEFAULT_HOLD_FRAMES,
        }
    }
}

fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_THRESHOLD;
    }
    value.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Lock-free view of the gate, shared between the audio thread and the UI.
///
/// Values are stored as `f32` bit patterns.
#[derive(Clone)]
pub struct VadMonitor {
    inner: Arc<MonitorState>,
}

struct MonitorState {
    threshold: AtomicU32,
    smoothed: AtomicU32,
    active: AtomicBool,
}

impl VadMonitor {
    pub fn new(threshold: f32) -> Self {
        Self {
            inner: Arc::new(MonitorState {
                threshold: AtomicU32::new(clamp_threshold(threshold).to_bits()),
                smoothed: AtomicU32::new(0.0f32.to_bits()),
                active: AtomicBool::new(false),
            }),
        }
    }

    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.inner.threshold.load(Ordering::Relaxed))
    }

    /// Takes effect from the next frame. Values outside [0.5, 0.98] are clamped.
    pub fn set_threshold(&self, threshold: f32) {
        self.inner
            .threshold
            .store(clamp_threshold(threshold).to_bits(), Ordering::Relaxed);
    }

    /// Exponentially smoothed voice probability.
    pub fn probability(&self) -> f32 {
        f32::from_bits(self.inner.smoothed.load(Ordering::Relaxed))
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Relaxed)
    }

    /// Forget the previous session's probability and voice state. The
    /// threshold is a user setting and survives.
    pub(crate) fn reset(&self) {
        self.inner.smoothed.store(0.0f32.to_bits(), Ordering::Relaxed);
        self.inner.active.store(false, Ordering::Relaxed);
    }

    fn record(&self, probability: f32, active: bool) {
        let prev = self.probability();
        let next = SMOOTHING * prev + (1.0 - SMOOTHING) * probability;
        self.inner.smoothed.store(next.to_bits(), Ordering::Relaxed);
        self.inner.active.store(active, Ordering::Relaxed);
    }
}

impl Default for VadMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Per-frame gate decision.
pub struct VoiceGate {
    monitor: VadMonitor,
    hold_frames: u32,
    hold: u32,
}

impl VoiceGate {
    pub fn new(monitor: VadMonitor, hold_frames: u32) -> Self {
        Self {
            monitor,
            hold_frames,
            hold: 0,
        }
    }

    pub fn monitor(&self) -> &VadMonitor {
        &self.monitor
    }

    /// Feed one frame's voice probability, returning whether voice is active.
    pub fn update(&mut self, probability: f32) -> bool {
        let active = if probability >= self.monitor.threshold() {
            self.hold = self.hold_frames;
            true
        } else if self.hold > 0 {
            self.hold -= 1;
            true
        } else {
            false
        };
        self.monitor.record(probability, active);
        active
    }

    /// Decide on `frame` and zero it if voice is inactive.
    pub fn apply(&mut self, probability: f32, frame: &mut [f32]) -> bool {
        let active = self.update(probability);
        if !active {
            frame.fill(0.0);
        }
        active
    }
}
