//! Device, surface and the GPU frame backend

pub mod backend;
pub mod context;

pub use backend::{GpuFrame, GpuFrameBackend};
pub use context::GpuContext;
