//! Frame loop

pub mod pipeline;
pub mod stats;

pub use pipeline::{FrameBackend, FrameOutcome, FramePipeline, FrameState};
pub use stats::FrameStats;
