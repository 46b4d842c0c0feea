//! Error types for boidcast
//!
//! Errors are grouped by how the frame loop reacts to them: configuration and
//! GPU initialization errors are fatal, frame errors are either transient
//! (skip the frame) or fatal, and telemetry errors are soft (drop the data).

use thiserror::Error;

/// Invalid process configuration, detected once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised while acquiring the device or creating GPU resources.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported texture format for this adapter")]
    UnsupportedSurface,
    #[error("failed to create {label}: {message}")]
    ResourceCreation { label: &'static str, message: String },
    #[error("{requested} particles exceed the dispatch limit of {max} particles")]
    TooManyParticles { requested: u32, max: u32 },
}

/// Errors raised while producing a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The surface timed out, is outdated, or was lost. The frame is skipped.
    #[error("surface unavailable: {0}")]
    Transient(wgpu::SurfaceError),
    /// Anything else. The process shuts down.
    #[error("fatal frame error: {0}")]
    Fatal(String),
}

impl FrameError {
    /// Classifies a surface acquisition error.
    pub fn from_surface(error: wgpu::SurfaceError) -> Self {
        match error {
            wgpu::SurfaceError::Timeout
            | wgpu::SurfaceError::Outdated
            | wgpu::SurfaceError::Lost => FrameError::Transient(error),
            other => FrameError::Fatal(other.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FrameError::Transient(_))
    }
}

/// A staging buffer could not be mapped for reading.
#[derive(Debug, Clone, Error)]
pub enum MapError {
    #[error("buffer map failed: {0}")]
    Failed(String),
    #[error("map request was dropped before completing")]
    Canceled,
}

/// Releasing a staging buffer mapping failed.
#[derive(Debug, Clone, Error)]
#[error("buffer unmap failed: {0}")]
pub struct UnmapError(pub String);

/// A readback produced a float sequence that is not a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("snapshot has {actual} floats, expected {expected}")]
pub struct SnapshotLengthError {
    pub expected: usize,
    pub actual: usize,
}

/// A sink could not hand a message to its transport.
#[derive(Debug, Error)]
#[error("publish to {subject} failed: {reason}")]
pub struct PublishError {
    pub subject: String,
    pub reason: String,
}

/// Errors that end the application run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("GPU initialization failed: {0}")]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("failed to start telemetry sink thread: {0}")]
    SinkThread(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_error_classification() {
        assert!(FrameError::from_surface(wgpu::SurfaceError::Timeout).is_transient());
        assert!(FrameError::from_surface(wgpu::SurfaceError::Outdated).is_transient());
        assert!(FrameError::from_surface(wgpu::SurfaceError::Lost).is_transient());
        assert!(!FrameError::from_surface(wgpu::SurfaceError::OutOfMemory).is_transient());
    }
}
