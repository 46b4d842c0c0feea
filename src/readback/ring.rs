//! Ring of staging slots for non-blocking readback
//!
//! A frame that finds a free slot copies the freshly computed particles into
//! it. The map is requested after submit and its completion is picked up by a
//! later frame, which extracts a [`Snapshot`] and frees the slot. A frame that
//! finds no free slot simply skips the copy.

use std::collections::VecDeque;

use futures::channel::oneshot;

use super::slots::SlotTable;
use super::staging::StagingBuffer;
use crate::error::MapError;
use crate::telemetry::{PushOutcome, Snapshot, TelemetryChannel};

struct PendingMap {
    slot: usize,
    frame: u64,
}

struct InFlight {
    slot: usize,
    frame: u64,
    done: oneshot::Receiver<Result<(), MapError>>,
}

/// Counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    pub copies_scheduled: u64,
    pub copies_skipped: u64,
    pub snapshots_extracted: u64,
    pub map_failures: u64,
    pub unmap_failures: u64,
}

pub struct ReadbackRing<S: StagingBuffer> {
    slots: SlotTable,
    buffers: Vec<S>,
    pending: Vec<PendingMap>,
    in_flight: VecDeque<InFlight>,
    particle_count: usize,
    stats: RingStats,
}

impl<S: StagingBuffer> ReadbackRing<S> {
    /// One slot per staging buffer, each sized for `particle_count` particles.
    pub fn new(buffers: Vec<S>, particle_count: usize) -> Self {
        Self {
            slots: SlotTable::new(buffers.len()),
            buffers,
            pending: Vec::new(),
            in_flight: VecDeque::new(),
            particle_count,
            stats: RingStats::default(),
        }
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn stats(&self) -> RingStats {
        self.stats
    }

    /// Maps requested and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }

    /// Reserves a free slot and encodes a copy of `source` into it.
    ///
    /// Returns the slot, or `None` when every slot is busy. In that case
    /// nothing is encoded and the copy is not retried.
    pub fn schedule_copy(
        &mut self,
        encoder: &mut S::Encoder,
        source: &S::Source,
        frame: u64,
    ) -> Option<usize> {
        let Some(slot) = self.slots.reserve() else {
            self.stats.copies_skipped += 1;
            log::trace!("No free staging slot, skipping readback of frame {frame}");
            return None;
        };

        self.buffers[slot].encode_copy(encoder, source);
        self.pending.push(PendingMap { slot, frame });
        self.stats.copies_scheduled += 1;
        Some(slot)
    }

    /// Requests maps for every slot copied into this frame. Call after submit.
    pub fn begin_maps(&mut self) {
        for PendingMap { slot, frame } in self.pending.drain(..) {
            let (sender, receiver) = oneshot::channel();
            self.buffers[slot].request_map(sender);
            self.in_flight.push_back(InFlight {
                slot,
                frame,
                done: receiver,
            });
        }
    }

    /// Handles every completed map: extract, unmap, free, push.
    ///
    /// Returns how many snapshots were pushed into `channel`.
    pub fn drain_completions(&mut self, channel: &TelemetryChannel) -> usize {
        let mut in_flight = std::mem::take(&mut self.in_flight);
        let mut pushed = 0;

        in_flight.retain_mut(|map| {
            let result = match map.done.try_recv() {
                Ok(Some(result)) => result,
                Ok(None) => return true,
                Err(oneshot::Canceled) => Err(MapError::Canceled),
            };

            if let Some(snapshot) = self.complete(map.slot, map.frame, result) {
                if channel.push(snapshot) == PushOutcome::Queued {
                    pushed += 1;
                }
            }
            false
        });

        self.in_flight = in_flight;
        pushed
    }

    fn complete(
        &mut self,
        slot: usize,
        frame: u64,
        result: Result<(), MapError>,
    ) -> Option<Snapshot> {
        let values = match result {
            Ok(()) => Some(self.buffers[slot].read_floats()),
            Err(error) => {
                self.stats.map_failures += 1;
                log::warn!("Readback of frame {frame} from slot {slot} failed: {error}");
                None
            }
        };

        if values.is_none() && !self.buffers[slot].is_mapped() {
            // nothing to unmap after a failed map
            self.slots.release(slot);
        } else {
            self.unmap_slot(slot);
        }

        let snapshot = match Snapshot::capture(frame, self.particle_count, values?) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::error!("Discarding readback of frame {frame}: {error}");
                return None;
            }
        };
        self.stats.snapshots_extracted += 1;
        Some(snapshot)
    }

    /// Frees the slot, or retires it for good when the mapping cannot be released.
    fn unmap_slot(&mut self, slot: usize) {
        match self.buffers[slot].unmap() {
            Ok(()) => {
                self.slots.release(slot);
            }
            Err(error) => {
                self.stats.unmap_failures += 1;
                self.slots.retire(slot);
                log::error!(
                    "Retiring staging slot {slot}: {error} ({} slots left)",
                    self.slots.len() - self.slots.retired_count()
                );
            }
        }
    }
}
