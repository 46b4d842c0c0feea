//! # Boidcast Prelude
//!
//! Commonly used types in one import.
//!
//! ```rust
//! use boidcast::prelude::*;
//!
//! let (channel, receiver) = telemetry_channel(2);
//! let particles = spawn_particles(4, 42);
//! let values: Vec<f32> = bytemuck::cast_slice(&particles).to_vec();
//! let snapshot = Snapshot::from_floats(0, 0, particles.len(), values).unwrap();
//! assert_eq!(channel.push(snapshot), PushOutcome::Queued);
//! assert_eq!(receiver.try_recv().unwrap().map(|s| s.frame), Some(0));
//! ```

pub use crate::config::{Config, SinkKind};
pub use crate::error::{FrameError, GpuError, MapError, PublishError, UnmapError};
pub use crate::frame::{FrameBackend, FrameOutcome, FramePipeline, FrameState, FrameStats};
pub use crate::readback::{ReadbackRing, SlotState, SlotTable, StagingBuffer};
pub use crate::simulation::{
    spawn_particles, work_group_count, BufferParity, BufferingMode, Particle, SimulationParams,
};
pub use crate::telemetry::{
    telemetry_channel, AxisRecord, ColumnarSink, FlockBatch, PerAxisSink, PushOutcome,
    SinkWorker, Snapshot, SnapshotSink, TelemetryChannel, TelemetryReceiver,
};
