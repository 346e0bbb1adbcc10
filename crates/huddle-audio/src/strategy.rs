//! Gate strategies and the owned gate session.

use std::sync::Arc;

use huddle_common::{AudioError, MediaTrack, TrackKind};
use tracing::{debug, info};

use crate::denoiser::DenoiserFactory;
use crate::engine::{AudioEngine, ProcessingNode, ProcessingPrimitive};
use crate::gate::{GateConfig, VadMonitor, VoiceGate};
use crate::processor::BlockProcessor;

/// One way of installing the gate into the audio graph.
pub trait GateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn start(
        &self,
        source: &MediaTrack,
        monitor: &VadMonitor,
    ) -> Result<Box<dyn ProcessingNode>, AudioError>;
}

/// Installs the gate on one engine primitive.
pub struct GraphStrategy {
    primitive: ProcessingPrimitive,
    engine: Arc<dyn AudioEngine>,
    factory: Arc<dyn DenoiserFactory>,
    hold_frames: u32,
}

impl GraphStrategy {
    pub fn new(
        primitive: ProcessingPrimitive,
        engine: Arc<dyn AudioEngine>,
        factory: Arc<dyn DenoiserFactory>,
        hold_frames: u32,
    ) -> Self {
        Self {
            primitive,
            engine,
            factory,
            hold_frames,
        }
    }
}

impl GateStrategy for GraphStrategy {
    fn name(&self) -> &'static str {
        self.primitive.as_str()
    }

    fn start(
        &self,
        source: &MediaTrack,
        monitor: &VadMonitor,
    ) -> Result<Box<dyn ProcessingNode>, AudioError> {
        if !self.engine.supports(self.primitive) {
            return Err(AudioError::Unsupported(self.primitive.to_string()));
        }
        let denoiser = self.factory.create()?;
        let gate = VoiceGate::new(monitor.clone(), self.hold_frames);
        let processor = BlockProcessor::new(self.primitive.block_size(), denoiser, gate);
        self.engine.attach(self.primitive, source, processor)
    }
}

// ---------------------------------------------------------------------------
// Noise gate
// ---------------------------------------------------------------------------

/// Ranked list of strategies; the first one that starts wins.
pub struct NoiseGate {
    strategies: Vec<Box<dyn GateStrategy>>,
    monitor: VadMonitor,
}

impl NoiseGate {
    /// Worklet first, then script processor, then passthrough.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        factory: Arc<dyn DenoiserFactory>,
        config: GateConfig,
    ) -> Self {
        let strategies: Vec<Box<dyn GateStrategy>> = [
            ProcessingPrimitive::Worklet,
            ProcessingPrimitive::ScriptProcessor,
        ]
        .into_iter()
        .map(|primitive| {
            Box::new(GraphStrategy::new(
                primitive,
                engine.clone(),
                factory.clone(),
                config.hold_frames,
            )) as Box<dyn GateStrategy>
        })
        .collect();
        Self::with_strategies(strategies, config)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn GateStrategy>>, config: GateConfig) -> Self {
        Self {
            strategies,
            monitor: VadMonitor::new(config.threshold),
        }
    }

    pub fn monitor(&self) -> &VadMonitor {
        &self.monitor
    }

    pub fn set_threshold(&self, threshold: f32) {
        self.monitor.set_threshold(threshold);
    }

    /// Start gating `source`.
    ///
    /// Falls back to passing `source` through unchanged when no strategy
    /// can start. Only a non-audio track is an error.
    pub fn start(&self, source: MediaTrack) -> Result<GateSession, AudioError> {
        if source.kind() != TrackKind::Audio {
            return Err(AudioError::NotAudio(source.id().to_string()));
        }
        self.monitor.reset();

        for strategy in &self.strategies {
            match strategy.start(&source, &self.monitor) {
                Ok(node) => {
                    info!(strategy = strategy.name(), track = %source.id(), "Noise gate attached");
                    return Ok(GateSession {
                        output: node.output(),
                        original: source,
                        node: Some(node),
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "Gate strategy unavailable");
                }
            }
        }

        info!(track = %source.id(), "No gate strategy available, passing audio through");
        Ok(GateSession {
            output: source.clone(),
            original: source,
            node: None,
            strategy: "passthrough",
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A running gate. Dropping it releases the processing node and the model.
pub struct GateSession {
    original: MediaTrack,
    output: MediaTrack,
    node: Option<Box<dyn ProcessingNode>>,
    strategy: &'static str,
}

impl GateSession {
    /// The track to send: processed, or the original on passthrough.
    pub fn output_track(&self) -> &MediaTrack {
        &self.output
    }

    pub fn original_track(&self) -> &MediaTrack {
        &self.original
    }

    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn is_passthrough(&self) -> bool {
        self.node.is_none()
    }

    /// Tear the gate down and hand back the source track.
    pub fn stop(mut self) -> MediaTrack {
        self.release();
        self.original.clone()
    }

    fn release(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.release();
            debug!(strategy = self.strategy, "Noise gate released");
        }
    }
}

impl Drop for GateSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for GateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateSession")
            .field("strategy", &self.strategy)
            .field("original", &self.original)
            .field("output", &self.output)
            .finish()
    }
}
