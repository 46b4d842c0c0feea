//! # Frame Performance Reporting
//!
//! Tracks recent frame times and periodically logs them together with the
//! frame loop and readback counters.
//!
//! ## Usage
//!
//! ```rust
//! use boidcast::frame::FrameStats;
//! use boidcast::performance::PerformanceMonitor;
//! use boidcast::readback::RingStats;
//!
//! let mut monitor = PerformanceMonitor::new();
//!
//! // In your main loop
//! monitor.begin_frame();
//! // ... render frame ...
//! monitor.end_frame();
//!
//! monitor.log_if_due(FrameStats::default(), RingStats::default(), 0);
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::frame::FrameStats;
use crate::readback::RingStats;

/// Frame time metrics over the sample window
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    /// Current frames per second
    pub fps: f32,
    /// Average frame time in milliseconds
    pub frame_time_ms: f32,
    /// Minimum frame time in the current window
    pub min_frame_time_ms: f32,
    /// Maximum frame time in the current window
    pub max_frame_time_ms: f32,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: 0.0,
            frame_time_ms: 0.0,
            min_frame_time_ms: f32::MAX,
            max_frame_time_ms: 0.0,
        }
    }
}

/// Performance monitoring system
pub struct PerformanceMonitor {
    /// Ring buffer of recent frame times for averaging
    frame_times: VecDeque<Duration>,
    /// Maximum number of frame times to keep for averaging
    max_samples: usize,
    /// Start time of the current frame
    frame_start: Option<Instant>,
    current_metrics: PerformanceMetrics,
    /// Last time a report was logged
    last_report: Instant,
    report_interval: Duration,
    /// Counters at the last report
    reported_stats: FrameStats,
}

impl PerformanceMonitor {
    /// Create a monitor reporting every 5 seconds
    pub fn new() -> Self {
        Self::with_config(120, Duration::from_secs(5))
    }

    pub fn with_config(max_samples: usize, report_interval: Duration) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            frame_start: None,
            current_metrics: PerformanceMetrics::default(),
            last_report: Instant::now(),
            report_interval,
            reported_stats: FrameStats::default(),
        }
    }

    /// Mark the beginning of a frame
    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Mark the end of a frame and update metrics
    pub fn end_frame(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.add_frame_time(start.elapsed());
        }
    }

    /// Add a frame time sample
    pub fn add_frame_time(&mut self, frame_time: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        self.update_metrics();
    }

    fn update_metrics(&mut self) {
        if self.frame_times.is_empty() {
            return;
        }

        let total_time: Duration = self.frame_times.iter().sum();
        let avg_frame_time = total_time / self.frame_times.len() as u32;
        let avg_frame_time_ms = avg_frame_time.as_secs_f32() * 1000.0;

        self.current_metrics.frame_time_ms = avg_frame_time_ms;
        self.current_metrics.fps = if avg_frame_time_ms > 0.0 {
            1000.0 / avg_frame_time_ms
        } else {
            0.0
        };

        if let (Some(min_time), Some(max_time)) =
            (self.frame_times.iter().min(), self.frame_times.iter().max())
        {
            self.current_metrics.min_frame_time_ms = min_time.as_secs_f32() * 1000.0;
            self.current_metrics.max_frame_time_ms = max_time.as_secs_f32() * 1000.0;
        }
    }

    /// Get current performance metrics
    pub fn get_metrics(&self) -> &PerformanceMetrics {
        &self.current_metrics
    }

    /// Logs metrics and counter deltas once per report interval.
    ///
    /// Returns whether a report was written.
    pub fn log_if_due(
        &mut self,
        stats: FrameStats,
        ring: RingStats,
        snapshots_dropped: u64,
    ) -> bool {
        if self.last_report.elapsed() < self.report_interval {
            return false;
        }

        log::info!("{}", self.report(stats, ring, snapshots_dropped));
        if ring.map_failures > 0 || ring.unmap_failures > 0 {
            log::warn!(
                "Readback failures so far: {} failed maps, {} retired slots",
                ring.map_failures,
                ring.unmap_failures
            );
        }

        self.reported_stats = stats;
        self.last_report = Instant::now();
        true
    }

    fn report(&self, stats: FrameStats, ring: RingStats, snapshots_dropped: u64) -> String {
        let metrics = &self.current_metrics;
        format!(
            "{:.1} fps, {:.2}ms avg ({:.2}..{:.2}ms) | last {}s: {} | {} extracted, {} dropped",
            metrics.fps,
            metrics.frame_time_ms,
            metrics.min_frame_time_ms,
            metrics.max_frame_time_ms,
            self.report_interval.as_secs(),
            stats.since(&self.reported_stats),
            ring.snapshots_extracted,
            snapshots_dropped
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
