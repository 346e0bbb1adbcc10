//! Denoiser model abstraction and the RNNoise-backed implementation.

use huddle_common::AudioError;
use nnnoiseless::{DenoiseState, FRAME_SIZE};

/// A frame-based denoising model.
///
/// Samples are normalized `f32` in [-1, 1]. `process_frame` denoises in
/// place and returns the model's voice probability for the frame.
pub trait Denoiser: Send {
    fn frame_size(&self) -> usize;

    fn process_frame(&mut self, frame: &mut [f32]) -> f32;
}

/// Creates one model context per gate session.
pub trait DenoiserFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Denoiser>, AudioError>;
}

/// `nnnoiseless` works on 16-bit sample magnitudes.
const SCALE: f32 = 32767.0;

pub struct RnnoiseDenoiser {
    state: Box<DenoiseState<'static>>,
    input: Vec<f32>,
}

impl RnnoiseDenoiser {
    pub fn new() -> Self {
        Self {
            state: DenoiseState::new(),
            input: vec![0.0; FRAME_SIZE],
        }
    }
}

impl Default for RnnoiseDenoiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Denoiser for RnnoiseDenoiser {
    fn frame_size(&self) -> usize {
        FRAME_SIZE
    }

    fn process_frame(&mut self, frame: &mut [f32]) -> f32 {
        if frame.len() != FRAME_SIZE {
            return 0.0;
        }
        for (dst, src) in self.input.iter_mut().zip(frame.iter()) {
            *dst = src * SCALE;
        }
        let probability = self.state.process_frame(frame, &self.input);
        for sample in frame.iter_mut() {
            *sample /= SCALE;
        }
        probability
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RnnoiseFactory;

impl DenoiserFactory for RnnoiseFactory {
    fn create(&self) -> Result<Box<dyn Denoiser>, AudioError> {
        Ok(Box::new(RnnoiseDenoiser::new()))
    }
}
