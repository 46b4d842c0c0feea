//! Snapshot export
//!
//! Snapshots leave the frame loop through a bounded [`TelemetryChannel`] and
//! are consumed by a [`SnapshotSink`] on its own thread.

pub mod channel;
pub mod columns;
pub mod publish;
pub mod records;
pub mod sink;
pub mod snapshot;

pub use channel::{telemetry_channel, PushOutcome, TelemetryChannel, TelemetryReceiver};
pub use columns::{ColumnarSink, FlockBatch, FLOCK_SUBJECT};
pub use publish::{BrokerEndpoint, LogPublisher, MemoryPublisher, Message, Publisher};
pub use records::{AxisRecord, PerAxisSink};
pub use sink::{SinkSummary, SinkWorker, SnapshotSink, VecSink};
pub use snapshot::Snapshot;
