//! Re-framing between host blocks and fixed-size model frames.

use std::collections::VecDeque;

/// Adapts arbitrary host block sizes to a fixed frame size.
///
/// Input samples accumulate until a full frame is available; each frame is
/// handed to the caller to transform in place and then queued for output.
/// The output queue starts primed with one frame of silence, so output lags
/// input by exactly one frame and never underruns.
pub struct Reframer {
    frame_size: usize,
    input: VecDeque<f32>,
    output: VecDeque<f32>,
    frame: Vec<f32>,
}

impl Reframer {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        let mut output = VecDeque::with_capacity(frame_size * 2);
        output.extend(std::iter::repeat(0.0).take(frame_size));
        Self {
            frame_size,
            input: VecDeque::with_capacity(frame_size * 2),
            output,
            frame: vec![0.0; frame_size],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples accepted but not yet part of a full frame.
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Push one host block through, writing the same number of samples out.
    ///
    /// `on_frame` runs once per completed frame, in order.
    pub fn process<F>(&mut self, input: &[f32], output: &mut [f32], mut on_frame: F)
    where
        F: FnMut(&mut [f32]),
    {
        self.input.extend(input.iter().copied());

        while self.input.len() >= self.frame_size {
            for (slot, sample) in self.frame.iter_mut().zip(self.input.drain(..self.frame_size)) {
                *slot = sample;
            }
            on_frame(&mut self.frame);
            self.output.extend(self.frame.iter().copied());
        }

        for slot in output.iter_mut() {
            *slot = self.output.pop_front().unwrap_or(0.0);
        }
    }
}
