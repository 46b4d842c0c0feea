// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Provides convenient wrappers for common wgpu operations.

pub mod binding_types;
pub mod buffers;
pub mod scope;

// Re-export main types
pub use binding_types::*;
pub use buffers::UniformBuffer;
pub use scope::checked;

/// Headless device for tests, `None` when the machine has no usable adapter.
#[cfg(test)]
pub(crate) fn test_device() -> Option<(std::sync::Arc<wgpu::Device>, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter =
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .ok()?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Test Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
        memory_hints: wgpu::MemoryHints::default(),
        trace: wgpu::Trace::Off,
    }))
    .ok()?;
    Some((std::sync::Arc::new(device), queue))
}
