//! Host audio engine surface.

use std::fmt;

use huddle_common::{AudioError, MediaTrack};

use crate::processor::BlockProcessor;

/// Processing primitives an engine may offer, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingPrimitive {
    /// Real-time render-thread callback, one 128-sample quantum at a time.
    Worklet,
    /// Coarser main-thread callback on 4096-sample blocks.
    ScriptProcessor,
}

impl ProcessingPrimitive {
    pub fn block_size(self) -> usize {
        match self {
            ProcessingPrimitive::Worklet => 128,
            ProcessingPrimitive::ScriptProcessor => 4096,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingPrimitive::Worklet => "worklet",
            ProcessingPrimitive::ScriptProcessor => "script-processor",
        }
    }
}

impl fmt::Display for ProcessingPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A processing graph the engine built around a source track.
pub trait ProcessingNode: Send {
    /// The processed track to send in place of the source.
    fn output(&self) -> MediaTrack;

    /// Disconnect the graph and drop the processor. Must be idempotent.
    fn release(&mut self);
}

/// The host's audio graph.
pub trait AudioEngine: Send + Sync {
    fn supports(&self, primitive: ProcessingPrimitive) -> bool;

    /// Route `source` through `processor` using `primitive`.
    fn attach(
        &self,
        primitive: ProcessingPrimitive,
        source: &MediaTrack,
        processor: BlockProcessor,
    ) -> Result<Box<dyn ProcessingNode>, AudioError>;
}
