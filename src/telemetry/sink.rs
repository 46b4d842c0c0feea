//! Snapshot consumers and the thread that drives them

use std::thread::{self, JoinHandle};

use super::channel::TelemetryReceiver;
use super::snapshot::Snapshot;

/// Consumer of exported snapshots.
///
/// Runs on the sink thread, never on the frame loop.
pub trait SnapshotSink: Send {
    /// Process a single snapshot.
    fn handle(&mut self, snapshot: &Snapshot);

    /// Called once after the last snapshot. Flush buffers, close connections.
    fn finalize(&mut self) {}

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub snapshots: Vec<Snapshot>,
    pub finalized: bool,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotSink for VecSink {
    fn handle(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Dedicated thread draining a [`TelemetryReceiver`] into a sink.
pub struct SinkWorker<S: SnapshotSink + 'static> {
    handle: JoinHandle<SinkSummary<S>>,
}

/// What a sink thread did before it stopped.
#[derive(Debug)]
pub struct SinkSummary<S> {
    pub sink: S,
    pub handled: u64,
}

impl<S: SnapshotSink + 'static> SinkWorker<S> {
    /// Starts the `telemetry-sink` thread. It runs until every producer is
    /// dropped and the queue is empty, then finalizes the sink.
    pub fn spawn(receiver: TelemetryReceiver, mut sink: S) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("telemetry-sink".to_string())
            .spawn(move || {
                log::info!("Telemetry sink '{}' started", sink.name());
                let mut handled = 0u64;
                while let Some(snapshot) = receiver.recv() {
                    sink.handle(&snapshot);
                    handled += 1;
                }
                sink.finalize();
                log::info!(
                    "Telemetry sink '{}' finished: {} snapshots handled, {} dropped upstream",
                    sink.name(),
                    handled,
                    receiver.dropped()
                );
                SinkSummary { sink, handled }
            })?;
        Ok(Self { handle })
    }

    /// Waits for the thread. `None` if the sink panicked.
    pub fn join(self) -> Option<SinkSummary<S>> {
        match self.handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                log::error!("Telemetry sink thread panicked");
                None
            }
        }
    }
}

impl<T: SnapshotSink + ?Sized> SnapshotSink for Box<T> {
    fn handle(&mut self, snapshot: &Snapshot) {
        (**self).handle(snapshot);
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
