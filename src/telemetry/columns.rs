//! Column-oriented encoding of a snapshot
//!
//! One [`FlockBatch`] per snapshot with a fixed schema: `time` as `i64`
//! microseconds, then `posX`, `posY`, `velX`, `velY` as `f32`. Every particle
//! becomes one row and all rows share the snapshot timestamp.

use super::publish::{Message, Publisher};
use super::sink::SnapshotSink;
use super::snapshot::Snapshot;

/// Subject the columnar batches are published under.
pub const FLOCK_SUBJECT: &str = "sensors.flock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int64,
    Float32,
}

pub const FLOCK_SCHEMA: [(&str, FieldKind); 5] = [
    ("time", FieldKind::Int64),
    ("posX", FieldKind::Float32),
    ("posY", FieldKind::Float32),
    ("velX", FieldKind::Float32),
    ("velY", FieldKind::Float32),
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Int64Column {
    values: Vec<i64>,
}

impl Int64Column {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, value: i64) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Float32Column {
    values: Vec<f32>,
}

impl Float32Column {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, value: f32) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One snapshot as columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlockBatch {
    pub time: Int64Column,
    pub pos_x: Float32Column,
    pub pos_y: Float32Column,
    pub vel_x: Float32Column,
    pub vel_y: Float32Column,
}

impl FlockBatch {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let rows = snapshot.particle_count();
        let mut batch = Self {
            time: Int64Column::with_capacity(rows),
            pos_x: Float32Column::with_capacity(rows),
            pos_y: Float32Column::with_capacity(rows),
            vel_x: Float32Column::with_capacity(rows),
            vel_y: Float32Column::with_capacity(rows),
        };

        for particle in snapshot.particles() {
            batch.time.append(snapshot.captured_at_micros);
            batch.pos_x.append(particle[0]);
            batch.pos_y.append(particle[1]);
            batch.vel_x.append(particle[2]);
            batch.vel_y.append(particle[3]);
        }
        batch
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Publishes one [`FlockBatch`] per snapshot.
pub struct ColumnarSink<P: Publisher> {
    publisher: P,
    subject: String,
    published: u64,
    failed: u64,
}

impl<P: Publisher> ColumnarSink<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            subject: FLOCK_SUBJECT.to_string(),
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

impl<P: Publisher> SnapshotSink for ColumnarSink<P> {
    fn handle(&mut self, snapshot: &Snapshot) {
        // empty snapshots carry nothing worth publishing
        if snapshot.values.is_empty() {
            return;
        }

        let message = Message::Batch {
            subject: self.subject.clone(),
            batch: FlockBatch::from_snapshot(snapshot),
        };
        match self.publisher.publish(message) {
            Ok(()) => self.published += 1,
            Err(error) => {
                self.failed += 1;
                log::warn!("Dropping batch of frame {}: {}", snapshot.frame, error);
            }
        }
    }

    fn finalize(&mut self) {
        if let Err(error) = self.publisher.flush() {
            log::warn!("Flush failed: {error}");
        }
    }

    fn name(&self) -> &str {
        "columnar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::publish::MemoryPublisher;

    fn two_particles() -> Snapshot {
        let values = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        Snapshot::from_floats(9, 1_700_000, 2, values).unwrap()
    }

    #[test]
    fn test_batch_columns() {
        let batch = FlockBatch::from_snapshot(&two_particles());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.time.values(), &[1_700_000, 1_700_000]);
        assert_eq!(batch.pos_x.values(), &[0.1, 0.5]);
        assert_eq!(batch.pos_y.values(), &[0.2, 0.6]);
        assert_eq!(batch.vel_x.values(), &[0.3, 0.7]);
        assert_eq!(batch.vel_y.values(), &[0.4, 0.8]);
    }

    #[test]
    fn test_schema_order() {
        let names: Vec<&str> = FLOCK_SCHEMA.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["time", "posX", "posY", "velX", "velY"]);
        assert_eq!(FLOCK_SCHEMA[0].1, FieldKind::Int64);
    }

    #[test]
    fn test_sink_publishes_under_flock_subject() {
        let mut sink = ColumnarSink::new(MemoryPublisher::new());
        sink.handle(&two_particles());
        sink.finalize();
        assert_eq!(sink.published(), 1);

        let publisher = sink.into_publisher();
        assert!(publisher.flushed);
        assert_eq!(publisher.messages.len(), 1);
        assert_eq!(publisher.messages[0].subject(), FLOCK_SUBJECT);
    }

    #[test]
    fn test_publish_failure_is_soft() {
        let mut sink = ColumnarSink::new(MemoryPublisher::failing_after(1));
        sink.handle(&two_particles());
        sink.handle(&two_particles());
        sink.handle(&two_particles());
        assert_eq!(sink.published(), 1);
        assert_eq!(sink.failed(), 2);
    }
}
