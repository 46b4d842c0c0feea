//! Per-axis encoding of a snapshot
//!
//! Every particle yields four records, one per measurement and axis, each on
//! its own subject `flock.<id>.<pos|vel>.<x|y>`.

use std::fmt;

use super::publish::{Message, Publisher};
use super::sink::SnapshotSink;
use super::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Position,
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Position => f.write_str("pos"),
            Measurement::Velocity => f.write_str("vel"),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

/// Order of the four floats of a particle within a snapshot.
const LAYOUT: [(Measurement, Axis); 4] = [
    (Measurement::Position, Axis::X),
    (Measurement::Position, Axis::Y),
    (Measurement::Velocity, Axis::X),
    (Measurement::Velocity, Axis::Y),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRecord {
    pub particle: usize,
    pub measurement: Measurement,
    pub axis: Axis,
    pub time: i64,
    pub value: f32,
}

impl AxisRecord {
    pub fn subject(&self) -> String {
        format!("flock.{}.{}.{}", self.particle, self.measurement, self.axis)
    }

    /// All records of `snapshot`, particle by particle.
    pub fn explode(snapshot: &Snapshot) -> impl Iterator<Item = AxisRecord> + '_ {
        snapshot
            .particles()
            .enumerate()
            .flat_map(move |(particle, values)| {
                LAYOUT
                    .iter()
                    .zip(values.iter())
                    .map(move |(&(measurement, axis), &value)| AxisRecord {
                        particle,
                        measurement,
                        axis,
                        time: snapshot.captured_at_micros,
                        value,
                    })
            })
    }
}

/// Publishes every [`AxisRecord`] of a snapshot individually.
pub struct PerAxisSink<P: Publisher> {
    publisher: P,
    published: u64,
    failed: u64,
}

impl<P: Publisher> PerAxisSink<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            published: 0,
            failed: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }
}

impl<P: Publisher> SnapshotSink for PerAxisSink<P> {
    fn handle(&mut self, snapshot: &Snapshot) {
        let mut failed_here = 0u64;
        for record in AxisRecord::explode(snapshot) {
            match self.publisher.publish(Message::Record(record)) {
                Ok(()) => self.published += 1,
                Err(error) => {
                    if failed_here == 0 {
                        log::warn!("Dropping records of frame {}: {}", snapshot.frame, error);
                    }
                    failed_here += 1;
                }
            }
        }
        self.failed += failed_here;
    }

    fn finalize(&mut self) {
        if let Err(error) = self.publisher.flush() {
            log::warn!("Flush failed: {error}");
        }
    }

    fn name(&self) -> &str {
        "per_axis"
    }
}
