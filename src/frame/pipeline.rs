//! Per-frame sequencing of compute, readback copy and render
//!
//! One call to [`FramePipeline::tick`] walks
//! `Idle -> ComputeQueued -> [CopyQueued] -> RenderQueued -> Submitted -> Idle`.
//! The GPU work is reached through [`FrameBackend`], so the sequencing runs the
//! same against a device or a test double.

use crate::error::FrameError;
use crate::simulation::{BufferParity, BufferingMode};

use super::stats::FrameStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    ComputeQueued,
    CopyQueued,
    RenderQueued,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Presented {
        frame: u64,
        copied_slot: Option<usize>,
    },
    /// The surface was unavailable. Nothing was submitted.
    Skipped,
}

/// GPU operations of one frame.
pub trait FrameBackend {
    /// Work in progress for one frame: the acquired target and its encoder.
    type Frame;

    /// Acquires the surface texture and starts recording.
    fn begin_frame(&mut self) -> Result<Self::Frame, FrameError>;

    fn encode_compute(&mut self, frame: &mut Self::Frame, parity: BufferParity);

    /// Copies the buffer written this frame into a free staging slot, if any.
    fn encode_readback(
        &mut self,
        frame: &mut Self::Frame,
        parity: BufferParity,
        frame_index: u64,
    ) -> Option<usize>;

    fn encode_render(&mut self, frame: &mut Self::Frame, parity: BufferParity);

    /// Submits, presents, then requests maps for slots copied this frame.
    fn submit(&mut self, frame: Self::Frame) -> Result<(), FrameError>;

    /// Processes finished maps without waiting. Returns the snapshots produced.
    fn collect_readbacks(&mut self) -> usize;
}

pub struct FramePipeline<B: FrameBackend> {
    backend: B,
    mode: BufferingMode,
    readback_interval: u64,
    frame: u64,
    state: FrameState,
    stats: FrameStats,
}

impl<B: FrameBackend> FramePipeline<B> {
    pub fn new(backend: B, mode: BufferingMode) -> Self {
        Self {
            backend,
            mode,
            readback_interval: 1,
            frame: 0,
            state: FrameState::Idle,
            stats: FrameStats::default(),
        }
    }

    /// Attempt a readback copy only on every `interval`-th frame.
    pub fn with_readback_interval(mut self, interval: u64) -> Self {
        self.readback_interval = interval.max(1);
        self
    }

    /// Frames presented so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Runs one frame.
    ///
    /// Transient surface errors skip the frame and leave the counter alone.
    /// Any other error is returned and the pipeline should not be ticked again.
    pub fn tick(&mut self) -> Result<FrameOutcome, FrameError> {
        self.stats.snapshots_collected += self.backend.collect_readbacks() as u64;

        let mut frame = match self.backend.begin_frame() {
            Ok(frame) => frame,
            Err(error) if error.is_transient() => {
                log::debug!("Skipping frame {}: {}", self.frame, error);
                self.stats.skipped += 1;
                self.state = FrameState::Idle;
                return Ok(FrameOutcome::Skipped);
            }
            Err(error) => {
                self.state = FrameState::Idle;
                return Err(error);
            }
        };

        let parity = self.mode.parity(self.frame);

        self.backend.encode_compute(&mut frame, parity);
        self.state = FrameState::ComputeQueued;

        let copied_slot = if self.frame % self.readback_interval == 0 {
            let slot = self.backend.encode_readback(&mut frame, parity, self.frame);
            match slot {
                Some(_) => {
                    self.stats.copies_scheduled += 1;
                    self.state = FrameState::CopyQueued;
                }
                None => self.stats.copies_skipped += 1,
            }
            slot
        } else {
            None
        };

        self.backend.encode_render(&mut frame, parity);
        self.state = FrameState::RenderQueued;

        if let Err(error) = self.backend.submit(frame) {
            self.state = FrameState::Idle;
            return Err(error);
        }
        self.state = FrameState::Submitted;

        let presented = self.frame;
        self.frame += 1;
        self.stats.presented += 1;
        self.state = FrameState::Idle;

        Ok(FrameOutcome::Presented {
            frame: presented,
            copied_slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_next_acquire: Option<FrameError>,
        fail_submit: bool,
        free_slots: usize,
    }

    impl FrameBackend for Recorder {
        type Frame = Vec<String>;

        fn begin_frame(&mut self) -> Result<Vec<String>, FrameError> {
            match self.fail_next_acquire.take() {
                Some(error) => Err(error),
                None => Ok(vec!["acquire".to_string()]),
            }
        }

        fn encode_compute(&mut self, frame: &mut Vec<String>, parity: BufferParity) {
            frame.push(format!("compute w{}", parity.write));
        }

        fn encode_readback(
            &mut self,
            frame: &mut Vec<String>,
            parity: BufferParity,
            _frame_index: u64,
        ) -> Option<usize> {
            if self.free_slots == 0 {
                return None;
            }
            self.free_slots -= 1;
            frame.push(format!("copy w{}", parity.write));
            Some(self.free_slots)
        }

        fn encode_render(&mut self, frame: &mut Vec<String>, parity: BufferParity) {
            frame.push(format!("render r{}", parity.read));
        }

        fn submit(&mut self, frame: Vec<String>) -> Result<(), FrameError> {
            if self.fail_submit {
                return Err(FrameError::Fatal("device lost".to_string()));
            }
            self.calls.push(frame.join(", "));
            Ok(())
        }

        fn collect_readbacks(&mut self) -> usize {
            0
        }
    }

    #[test]
    fn test_frame_order_and_parity() {
        let backend = Recorder {
            free_slots: 8,
            ..Recorder::default()
        };
        let mut pipeline = FramePipeline::new(backend, BufferingMode::PingPong);
        pipeline.tick().unwrap();
        pipeline.tick().unwrap();

        assert_eq!(
            pipeline.backend().calls,
            vec![
                "acquire, compute w0, copy w0, render r1",
                "acquire, compute w1, copy w1, render r0",
            ]
        );
        assert_eq!(pipeline.frame(), 2);
        assert_eq!(pipeline.state(), FrameState::Idle);
    }

    #[test]
    fn test_transient_error_skips_frame() {
        let backend = Recorder {
            fail_next_acquire: Some(FrameError::from_surface(wgpu::SurfaceError::Outdated)),
            ..Recorder::default()
        };
        let mut pipeline = FramePipeline::new(backend, BufferingMode::PingPong);

        assert_eq!(pipeline.tick().unwrap(), FrameOutcome::Skipped);
        assert_eq!(pipeline.frame(), 0);
        assert_eq!(pipeline.state(), FrameState::Idle);
        assert_eq!(pipeline.stats().skipped, 1);
        assert!(pipeline.backend().calls.is_empty());

        assert_eq!(
            pipeline.tick().unwrap(),
            FrameOutcome::Presented {
                frame: 0,
                copied_slot: None
            }
        );
    }

    #[test]
    fn test_fatal_errors_propagate() {
        let backend = Recorder {
            fail_next_acquire: Some(FrameError::from_surface(wgpu::SurfaceError::OutOfMemory)),
            ..Recorder::default()
        };
        let mut pipeline = FramePipeline::new(backend, BufferingMode::InPlace);
        assert!(matches!(pipeline.tick(), Err(FrameError::Fatal(_))));

        pipeline.backend_mut().fail_submit = true;
        assert!(matches!(pipeline.tick(), Err(FrameError::Fatal(_))));
        assert_eq!(pipeline.frame(), 0);
        assert_eq!(pipeline.state(), FrameState::Idle);
    }

    #[test]
    fn test_no_free_slot_skips_copy_only() {
        let backend = Recorder {
            free_slots: 1,
            ..Recorder::default()
        };
        let mut pipeline = FramePipeline::new(backend, BufferingMode::InPlace);

        let first = pipeline.tick().unwrap();
        let second = pipeline.tick().unwrap();
        assert_eq!(
            first,
            FrameOutcome::Presented {
                frame: 0,
                copied_slot: Some(0)
            }
        );
        assert_eq!(
            second,
            FrameOutcome::Presented {
                frame: 1,
                copied_slot: None
            }
        );
        assert_eq!(pipeline.stats().copies_skipped, 1);
        assert_eq!(pipeline.backend().calls[1], "acquire, compute w0, render r0");
    }

    #[test]
    fn test_readback_interval() {
        let backend = Recorder {
            free_slots: 100,
            ..Recorder::default()
        };
        let mut pipeline =
            FramePipeline::new(backend, BufferingMode::PingPong).with_readback_interval(3);
        for _ in 0..7 {
            pipeline.tick().unwrap();
        }
        // frames 0, 3 and 6
        assert_eq!(pipeline.stats().copies_scheduled, 3);
        assert_eq!(pipeline.stats().copies_skipped, 0);
    }
}
