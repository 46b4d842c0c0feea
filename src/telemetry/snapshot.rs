//! One exported copy of the flock

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SnapshotLengthError;
use crate::simulation::FLOATS_PER_PARTICLE;

/// Host-side copy of every particle at the end of one frame's compute step.
///
/// `values` holds `posX, posY, velX, velY` per particle in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub frame: u64,
    pub captured_at_micros: i64,
    pub values: Vec<f32>,
}

impl Snapshot {
    /// Wraps `values` read back for `particle_count` particles, stamping the
    /// current wall clock.
    pub fn capture(
        frame: u64,
        particle_count: usize,
        values: Vec<f32>,
    ) -> Result<Self, SnapshotLengthError> {
        Self::from_floats(frame, unix_micros(), particle_count, values)
    }

    pub fn from_floats(
        frame: u64,
        captured_at_micros: i64,
        particle_count: usize,
        values: Vec<f32>,
    ) -> Result<Self, SnapshotLengthError> {
        let expected = particle_count * FLOATS_PER_PARTICLE;
        if values.len() != expected {
            return Err(SnapshotLengthError {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            frame,
            captured_at_micros,
            values,
        })
    }

    pub fn particle_count(&self) -> usize {
        self.values.len() / FLOATS_PER_PARTICLE
    }

    /// `[posX, posY, velX, velY]` of each particle.
    pub fn particles(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.values.chunks_exact(FLOATS_PER_PARTICLE)
    }
}

/// Microseconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_must_be_four_per_particle() {
        assert!(Snapshot::from_floats(0, 0, 2, vec![0.0; 8]).is_ok());
        assert_eq!(
            Snapshot::from_floats(0, 0, 2, vec![0.0; 7]),
            Err(SnapshotLengthError {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn test_particles_iterates_rows() {
        let snapshot =
            Snapshot::from_floats(3, 10, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        let rows: Vec<&[f32]> = snapshot.particles().collect();
        assert_eq!(rows, vec![&[1.0, 2.0, 3.0, 4.0][..], &[5.0, 6.0, 7.0, 8.0][..]]);
        assert_eq!(snapshot.particle_count(), 2);
    }

    #[test]
    fn test_capture_stamps_clock() {
        let snapshot = Snapshot::capture(1, 1, vec![0.0; 4]).unwrap();
        assert!(snapshot.captured_at_micros > 0);
    }
}
