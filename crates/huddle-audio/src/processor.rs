//! Per-block processing callback installed into the audio engine.

use crate::denoiser::Denoiser;
use crate::frame::Reframer;
use crate::gate::{VadMonitor, VoiceGate};

/// Re-frames host blocks, denoises each frame and gates it.
///
/// Owns the model context; dropping the processor releases it.
pub struct BlockProcessor {
    block_size: usize,
    reframer: Reframer,
    denoiser: Box<dyn Denoiser>,
    gate: VoiceGate,
}

impl BlockProcessor {
    pub fn new(block_size: usize, denoiser: Box<dyn Denoiser>, gate: VoiceGate) -> Self {
        Self {
            block_size,
            reframer: Reframer::new(denoiser.frame_size()),
            denoiser,
            gate,
        }
    }

    /// Host block size this processor was built for.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn monitor(&self) -> &VadMonitor {
        self.gate.monitor()
    }

    /// Process one host block. `output` receives `input.len()` samples
    /// (any extra output slots are zeroed).
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = input.len().min(output.len());
        let Self {
            reframer,
            denoiser,
            gate,
            ..
        } = self;
        reframer.process(&input[..n], &mut output[..n], |frame| {
            let probability = denoiser.process_frame(frame);
            gate.apply(probability, frame);
        });
        output[n..].fill(0.0);
    }
}
