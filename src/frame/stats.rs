//! Frame loop counters

use std::fmt;

/// Counters since startup, updated only by the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub presented: u64,
    pub skipped: u64,
    pub copies_scheduled: u64,
    pub copies_skipped: u64,
    pub snapshots_collected: u64,
}

impl FrameStats {
    /// Counts accumulated since `earlier`.
    pub fn since(&self, earlier: &FrameStats) -> FrameStats {
        FrameStats {
            presented: self.presented - earlier.presented,
            skipped: self.skipped - earlier.skipped,
            copies_scheduled: self.copies_scheduled - earlier.copies_scheduled,
            copies_skipped: self.copies_skipped - earlier.copies_skipped,
            snapshots_collected: self.snapshots_collected - earlier.snapshots_collected,
        }
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} presented, {} skipped, {} copies ({} skipped), {} snapshots",
            self.presented,
            self.skipped,
            self.copies_scheduled,
            self.copies_skipped,
            self.snapshots_collected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since() {
        let earlier = FrameStats {
            presented: 10,
            skipped: 1,
            copies_scheduled: 8,
            copies_skipped: 2,
            snapshots_collected: 7,
        };
        let now = FrameStats {
            presented: 25,
            skipped: 1,
            copies_scheduled: 20,
            copies_skipped: 5,
            snapshots_collected: 19,
        };
        let delta = now.since(&earlier);
        assert_eq!(delta.presented, 15);
        assert_eq!(delta.skipped, 0);
        assert_eq!(delta.copies_skipped, 3);
        assert_eq!(delta.snapshots_collected, 12);
    }
}
