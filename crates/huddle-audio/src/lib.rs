//! Microphone noise gate for huddle.
//!
//! Audio from the host engine arrives in blocks of whatever size the
//! processing primitive uses. Blocks are re-framed into denoiser frames,
//! denoised, and gated on the model's voice probability so that anything
//! that is not speech comes out as exact silence.
//!
//! Nothing here touches the network. The mesh crate swaps the gated track
//! onto its connections.

pub mod denoiser;
pub mod engine;
pub mod frame;
pub mod gate;
pub mod processor;
pub mod strategy;

pub use denoiser::{Denoiser, DenoiserFactory, RnnoiseDenoiser, RnnoiseFactory};
pub use engine::{AudioEngine, ProcessingNode, ProcessingPrimitive};
pub use frame::Reframer;
pub use gate::{GateConfig, VadMonitor, VoiceGate};
pub use processor::BlockProcessor;
pub use strategy::{GateSession, GateStrategy, GraphStrategy, NoiseGate};
