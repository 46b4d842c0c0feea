//! Staging buffers the ring copies into

use std::sync::Arc;

use futures::channel::oneshot;

use crate::error::{MapError, UnmapError};
use crate::wgpu_utils::buffers::create_staging_buffer;
use crate::wgpu_utils::scope;

/// Host-readable buffer that receives one copy of the particle data.
///
/// The ring only talks to staging memory through this trait.
pub trait StagingBuffer {
    /// Command recorder the copy is encoded into.
    type Encoder;
    /// Buffer the copy reads from.
    type Source: ?Sized;

    fn encode_copy(&self, encoder: &mut Self::Encoder, source: &Self::Source);

    /// Starts mapping for reading. `done` receives the result; the callback
    /// must not touch slot state.
    fn request_map(&self, done: oneshot::Sender<Result<(), MapError>>);

    /// Copies the mapped contents out. Only valid after a successful map.
    fn read_floats(&self) -> Vec<f32>;

    /// Whether the buffer is currently mapped. A failed map leaves it unmapped.
    fn is_mapped(&self) -> bool;

    /// Releases the mapping. Calling this on an unmapped buffer is an error.
    fn unmap(&self) -> Result<(), UnmapError>;
}

pub struct GpuStagingBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    device: Arc<wgpu::Device>,
}

impl GpuStagingBuffer {
    pub fn new(device: Arc<wgpu::Device>, index: usize, size: u64) -> Self {
        let buffer = create_staging_buffer(&device, &format!("Staging Slot {index}"), size);
        Self {
            buffer,
            size,
            device,
        }
    }

    /// Creates `count` staging buffers of `size` bytes.
    pub fn create_ring(device: &Arc<wgpu::Device>, count: usize, size: u64) -> Vec<Self> {
        (0..count)
            .map(|index| Self::new(device.clone(), index, size))
            .collect()
    }
}

impl StagingBuffer for GpuStagingBuffer {
    type Encoder = wgpu::CommandEncoder;
    type Source = wgpu::Buffer;

    fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, source: &wgpu::Buffer) {
        encoder.copy_buffer_to_buffer(source, 0, &self.buffer, 0, self.size);
    }

    fn request_map(&self, done: oneshot::Sender<Result<(), MapError>>) {
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                // the ring may already be gone at shutdown
                let _ = done.send(result.map_err(|error| MapError::Failed(error.to_string())));
            });
    }

    fn read_floats(&self) -> Vec<f32> {
        let view = self.buffer.slice(..).get_mapped_range();
        bytemuck::pod_collect_to_vec::<u8, f32>(&view)
    }

    fn is_mapped(&self) -> bool {
        matches!(self.buffer.map_state(), wgpu::MapState::Mapped)
    }

    fn unmap(&self) -> Result<(), UnmapError> {
        scope::push_validation(&self.device);
        self.buffer.unmap();
        match scope::pop_validation(&self.device) {
            Some(message) => Err(UnmapError(message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wgpu_utils::buffers::create_particle_buffer;
    use crate::wgpu_utils::test_device;

    #[test]
    fn test_copy_map_read_unmap() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let values: Vec<f32> = (0..16).map(|v| v as f32 * 0.5).collect();
        let source = create_particle_buffer(&device, "Source", &values);
        let staging = GpuStagingBuffer::new(device.clone(), 0, source.size());
        assert!(!staging.is_mapped());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        staging.encode_copy(&mut encoder, &source);
        queue.submit(Some(encoder.finish()));

        let (sender, mut receiver) = oneshot::channel();
        staging.request_map(sender);
        device.poll(wgpu::PollType::Wait).unwrap();
        assert!(matches!(receiver.try_recv(), Ok(Some(Ok(())))));
        assert!(staging.is_mapped());
        assert_eq!(staging.read_floats(), values);

        staging.unmap().unwrap();
        assert!(!staging.is_mapped());
    }
}
