//! Bounded hand-off between the frame loop and the sink thread
//!
//! The producer never waits. When the queue is full the incoming snapshot is
//! dropped and counted, so the snapshots already queued keep their FIFO order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TryRecvError, TrySendError};
use std::sync::Arc;

use super::snapshot::Snapshot;

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

/// Producer side, owned by the frame loop.
#[derive(Debug)]
pub struct TelemetryChannel {
    sender: mpsc::SyncSender<Snapshot>,
    counters: Arc<Counters>,
    capacity: usize,
}

/// Consumer side, owned by exactly one sink thread.
#[derive(Debug)]
pub struct TelemetryReceiver {
    receiver: mpsc::Receiver<Snapshot>,
    counters: Arc<Counters>,
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full and the snapshot was discarded.
    DroppedFull,
    /// The consumer is gone and the snapshot was discarded.
    DroppedClosed,
}

/// Creates a channel holding at most `capacity` snapshots.
pub fn telemetry_channel(capacity: usize) -> (TelemetryChannel, TelemetryReceiver) {
    let (sender, receiver) = mpsc::sync_channel(capacity);
    let counters = Arc::new(Counters::default());
    (
        TelemetryChannel {
            sender,
            counters: counters.clone(),
            capacity,
        },
        TelemetryReceiver { receiver, counters },
    )
}

impl TelemetryChannel {
    /// Queues `snapshot` without blocking.
    pub fn push(&self, snapshot: Snapshot) -> PushOutcome {
        match self.sender.try_send(snapshot) {
            Ok(()) => {
                self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Queued
            }
            Err(TrySendError::Full(dropped)) => {
                let total = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total.is_power_of_two() {
                    log::warn!(
                        "Telemetry queue full ({} slots), dropped frame {} ({} dropped so far)",
                        self.capacity,
                        dropped.frame,
                        total
                    );
                }
                PushOutcome::DroppedFull
            }
            Err(TrySendError::Disconnected(dropped)) => {
                let total = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total.is_power_of_two() {
                    log::warn!(
                        "Telemetry consumer gone, dropped snapshot of frame {}",
                        dropped.frame
                    );
                }
                PushOutcome::DroppedClosed
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pushed(&self) -> u64 {
        self.counters.pushed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetryReceiver {
    /// Waits for the next snapshot. `None` once every producer is gone and the
    /// queue is empty.
    pub fn recv(&self) -> Option<Snapshot> {
        self.receiver.recv().ok()
    }

    /// Next snapshot if one is queued.
    pub fn try_recv(&self) -> Result<Option<Snapshot>, TryRecvError> {
        match self.receiver.try_recv() {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(disconnected) => Err(disconnected),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

impl Iterator for TelemetryReceiver {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        self.recv()
    }
}
