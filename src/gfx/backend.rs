//! wgpu implementation of the frame operations

use std::iter;

use crate::error::FrameError;
use crate::frame::FrameBackend;
use crate::readback::{GpuStagingBuffer, ReadbackRing, RingStats};
use crate::simulation::{BufferParity, SimulationState};
use crate::telemetry::TelemetryChannel;
use crate::wgpu_utils::scope;

use super::context::GpuContext;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

/// Recording state of one frame.
pub struct GpuFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// Drives a [`SimulationState`] and a readback ring on a real device.
///
/// Drop order: ring, flock state, telemetry sender, then the device.
pub struct GpuFrameBackend {
    ring: ReadbackRing<GpuStagingBuffer>,
    state: SimulationState,
    telemetry: TelemetryChannel,
    context: GpuContext,
}

impl GpuFrameBackend {
    pub fn new(
        context: GpuContext,
        state: SimulationState,
        staging_slots: usize,
        telemetry: TelemetryChannel,
    ) -> Self {
        let buffers =
            GpuStagingBuffer::create_ring(context.device(), staging_slots, state.buffer_size());
        let ring = ReadbackRing::new(buffers, state.particle_count() as usize);
        log::info!(
            "Readback ring: {} slots of {} bytes, telemetry queue of {}",
            staging_slots,
            state.buffer_size(),
            telemetry.capacity()
        );

        Self {
            ring,
            state,
            telemetry,
            context,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    pub fn ring_stats(&self) -> RingStats {
        self.ring.stats()
    }

    pub fn telemetry(&self) -> &TelemetryChannel {
        &self.telemetry
    }
}

impl FrameBackend for GpuFrameBackend {
    type Frame = GpuFrame;

    fn begin_frame(&mut self) -> Result<GpuFrame, FrameError> {
        let texture = self.context.acquire()?;
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // popped in submit, catches validation errors of the whole frame
        scope::push_validation(self.context.device());
        let encoder = self
            .context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        Ok(GpuFrame {
            texture,
            view,
            encoder,
        })
    }

    fn encode_compute(&mut self, frame: &mut GpuFrame, parity: BufferParity) {
        self.state.dispatch(&mut frame.encoder, parity);
    }

    fn encode_readback(
        &mut self,
        frame: &mut GpuFrame,
        parity: BufferParity,
        frame_index: u64,
    ) -> Option<usize> {
        let source = self.state.write_buffer(parity)?;
        self.ring.schedule_copy(&mut frame.encoder, source, frame_index)
    }

    fn encode_render(&mut self, frame: &mut GpuFrame, parity: BufferParity) {
        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Flock Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.state.draw(&mut render_pass, parity);
    }

    fn submit(&mut self, frame: GpuFrame) -> Result<(), FrameError> {
        let GpuFrame {
            texture, encoder, ..
        } = frame;

        self.context.queue().submit(iter::once(encoder.finish()));
        if let Some(message) = scope::pop_validation(self.context.device()) {
            return Err(FrameError::Fatal(message));
        }

        texture.present();
        self.ring.begin_maps();
        Ok(())
    }

    fn collect_readbacks(&mut self) -> usize {
        if let Err(error) = self.context.device().poll(wgpu::PollType::Poll) {
            log::warn!("Device poll failed: {error}");
        }
        self.ring.drain_completions(&self.telemetry)
    }
}
