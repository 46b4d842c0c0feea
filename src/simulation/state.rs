//! GPU resources of the flock
//!
//! [`SimulationState`] owns every buffer, pipeline and bind group the flock
//! needs. Resources are acquired in a fixed order and released in the reverse
//! order, exactly once, whether construction completed or failed half way.

use super::buffering::{BufferParity, BufferingMode};
use super::params::SimulationParams;
use super::particle::{spawn_particles, work_group_count, Particle, PARTICLES_PER_GROUP};
use crate::error::GpuError;
use crate::wgpu_utils::buffers::{create_particle_buffer, create_vertex_buffer};
use crate::wgpu_utils::{binding_types, checked, UniformBuffer};

const COMPUTE_SHADER: &str = include_str!("shaders/compute.wgsl");
const COMPUTE_IN_PLACE_SHADER: &str = include_str!("shaders/compute_in_place.wgsl");
const DRAW_SHADER: &str = include_str!("shaders/draw.wgsl");

/// Shape drawn for every boid, in clip space around the particle position.
const TRIANGLE: [[f32; 2]; 3] = [[-0.01, -0.02], [0.01, -0.02], [0.0, 0.02]];

/// Startup parameters of a flock.
#[derive(Debug, Clone, Copy)]
pub struct FlockDescriptor {
    pub particle_count: u32,
    pub seed: u64,
    pub params: SimulationParams,
    pub mode: BufferingMode,
}

/// Particle buffers, pipelines and bind groups.
///
/// Fields are listed in acquisition order. Everything is optional so that a
/// partially built state can still be released in reverse order.
pub struct SimulationState {
    params_buffer: Option<UniformBuffer<SimulationParams>>,
    render_pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    compute_pipeline: Option<wgpu::ComputePipeline>,
    vertex_buffer: Option<wgpu::Buffer>,
    particle_buffers: Vec<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,

    particle_count: u32,
    work_groups: u32,
    mode: BufferingMode,
}

impl SimulationState {
    /// Spawns the flock from `desc.seed` and creates all GPU resources.
    ///
    /// Each creation step runs inside an error scope. The first captured
    /// error is returned and whatever was already created is released.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        desc: &FlockDescriptor,
    ) -> Result<Self, GpuError> {
        let max_particles = max_particles(device.limits().max_compute_workgroups_per_dimension);
        if desc.particle_count > max_particles {
            return Err(GpuError::TooManyParticles {
                requested: desc.particle_count,
                max: max_particles,
            });
        }

        let mut state = Self {
            params_buffer: None,
            render_pipeline: None,
            bind_group_layout: None,
            compute_pipeline: None,
            vertex_buffer: None,
            particle_buffers: Vec::new(),
            bind_groups: Vec::new(),
            particle_count: desc.particle_count,
            work_groups: work_group_count(desc.particle_count, PARTICLES_PER_GROUP),
            mode: desc.mode,
        };

        let params_buffer = checked(device, "simulation parameters", || {
            UniformBuffer::new_with_data(device, &desc.params)
        })?;
        state.params_buffer = Some(params_buffer);

        let render_pipeline = checked(device, "render pipeline", || {
            Self::create_render_pipeline(device, surface_format)
        })?;
        state.render_pipeline = Some(render_pipeline);

        let layout = checked(device, "compute bind group layout", || {
            Self::create_bind_group_layout(device, desc.mode)
        })?;
        let compute_pipeline = checked(device, "compute pipeline", || {
            Self::create_compute_pipeline(device, &layout, desc.mode)
        });
        state.bind_group_layout = Some(layout);
        state.compute_pipeline = Some(compute_pipeline?);

        let vertex_buffer = checked(device, "triangle vertex buffer", || {
            create_vertex_buffer(device, "Boid Triangle", &TRIANGLE)
        })?;
        state.vertex_buffer = Some(vertex_buffer);

        let particles = spawn_particles(desc.particle_count, desc.seed);
        for index in 0..desc.mode.buffer_count() {
            let buffer = checked(device, "particle buffer", || {
                create_particle_buffer(device, &format!("Particle Buffer {index}"), &particles)
            })?;
            state.particle_buffers.push(buffer);
        }

        let bind_groups = checked(device, "compute bind groups", || {
            state.create_bind_groups(device)
        })?;
        state.bind_groups = bind_groups;

        log::info!(
            "Flock ready: {} particles, {} work groups, {} buffering",
            state.particle_count,
            state.work_groups,
            state.mode
        );
        Ok(state)
    }

    fn create_bind_group_layout(
        device: &wgpu::Device,
        mode: BufferingMode,
    ) -> wgpu::BindGroupLayout {
        let entries = match mode {
            BufferingMode::PingPong => binding_types::compute_entries(&[
                binding_types::uniform(),
                binding_types::storage_buffer_read_only(),
                binding_types::storage_buffer_read_write(),
            ]),
            BufferingMode::InPlace => binding_types::compute_entries(&[
                binding_types::uniform(),
                binding_types::storage_buffer_read_write(),
            ]),
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flock Compute Layout"),
            entries: &entries,
        })
    }

    fn create_compute_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        mode: BufferingMode,
    ) -> wgpu::ComputePipeline {
        let source = match mode {
            BufferingMode::PingPong => COMPUTE_SHADER,
            BufferingMode::InPlace => COMPUTE_IN_PLACE_SHADER,
        };
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flock Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flock Compute Pipeline Layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Flock Compute Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        })
    }

    fn create_render_pipeline(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flock Draw Shader"),
            source: wgpu::ShaderSource::Wgsl(DRAW_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flock Render Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Flock Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("main_vs"),
                buffers: &[
                    Particle::instance_layout(),
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![2 => Float32x2],
                    },
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("main_fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Bind group `i` is used on frames whose write buffer is `i`.
    fn create_bind_groups(&self, device: &wgpu::Device) -> Vec<wgpu::BindGroup> {
        let (Some(layout), Some(params)) = (&self.bind_group_layout, &self.params_buffer) else {
            return Vec::new();
        };

        match self.mode {
            BufferingMode::PingPong => (0..2)
                .map(|write| {
                    let read = (write + 1) % 2;
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("Flock Bind Group {write}")),
                        layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: params.binding_resource(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: self.particle_buffers[read].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: self.particle_buffers[write].as_entire_binding(),
                            },
                        ],
                    })
                })
                .collect(),
            BufferingMode::InPlace => vec![device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Flock Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.binding_resource(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.particle_buffers[0].as_entire_binding(),
                    },
                ],
            })],
        }
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    pub fn mode(&self) -> BufferingMode {
        self.mode
    }

    /// Size in bytes of one particle buffer.
    pub fn buffer_size(&self) -> u64 {
        self.particle_count as u64 * Particle::SIZE
    }

    /// Buffer the compute pass writes for `parity`, which is also the readback source.
    pub fn write_buffer(&self, parity: BufferParity) -> Option<&wgpu::Buffer> {
        self.particle_buffers.get(parity.write)
    }

    /// Records one compute pass advancing the flock by a step.
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, parity: BufferParity) {
        let (Some(pipeline), Some(bind_group)) =
            (&self.compute_pipeline, self.bind_groups.get(parity.write))
        else {
            return;
        };

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Flock Compute Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, bind_group, &[]);
        compute_pass.dispatch_workgroups(self.work_groups, 1, 1);
    }

    /// Draws one triangle per particle from the buffer the render pass reads.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, parity: BufferParity) {
        let (Some(pipeline), Some(vertices), Some(particles)) = (
            &self.render_pipeline,
            &self.vertex_buffer,
            self.particle_buffers.get(parity.read),
        ) else {
            return;
        };

        render_pass.set_pipeline(pipeline);
        render_pass.set_vertex_buffer(0, particles.slice(..));
        render_pass.set_vertex_buffer(1, vertices.slice(..));
        render_pass.draw(0..TRIANGLE.len() as u32, 0..self.particle_count);
    }

    /// Drops every resource in reverse acquisition order.
    ///
    /// Safe to call more than once.
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        while self.bind_groups.pop().is_some() {}
        while self.particle_buffers.pop().is_some() {}
        self.vertex_buffer = None;
        self.compute_pipeline = None;
        self.bind_group_layout = None;
        self.render_pipeline = None;
        self.params_buffer = None;
        log::debug!("Flock resources released");
    }

    pub fn is_released(&self) -> bool {
        self.params_buffer.is_none()
            && self.render_pipeline.is_none()
            && self.bind_group_layout.is_none()
            && self.compute_pipeline.is_none()
            && self.vertex_buffer.is_none()
            && self.particle_buffers.is_empty()
            && self.bind_groups.is_empty()
    }
}

/// Largest flock a single dispatch can cover with `max_work_groups` groups.
pub fn max_particles(max_work_groups: u32) -> u32 {
    max_work_groups.saturating_mul(PARTICLES_PER_GROUP)
}

impl Drop for SimulationState {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readback::{GpuStagingBuffer, StagingBuffer};
    use crate::wgpu_utils::test_device;
    use futures::channel::oneshot;
    use std::sync::Arc;

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

    fn flock(particle_count: u32, mode: BufferingMode) -> FlockDescriptor {
        FlockDescriptor {
            particle_count,
            seed: 42,
            params: SimulationParams::default(),
            mode,
        }
    }

    fn read_back(
        device: &Arc<wgpu::Device>,
        queue: &wgpu::Queue,
        source: &wgpu::Buffer,
    ) -> Vec<f32> {
        let staging = GpuStagingBuffer::new(device.clone(), 0, source.size());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        staging.encode_copy(&mut encoder, source);
        queue.submit(Some(encoder.finish()));

        let (sender, mut receiver) = oneshot::channel();
        staging.request_map(sender);
        device.poll(wgpu::PollType::Wait).unwrap();
        receiver.try_recv().unwrap().unwrap().unwrap();
        let values = staging.read_floats();
        staging.unmap().unwrap();
        values
    }

    #[test]
    fn test_max_particles() {
        assert_eq!(max_particles(65535), 65535 * 64);
        assert_eq!(max_particles(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_resources_per_mode() {
        let Some((device, _queue)) = test_device() else {
            return;
        };

        for mode in [BufferingMode::PingPong, BufferingMode::InPlace] {
            let mut state = SimulationState::new(&device, FORMAT, &flock(100, mode)).unwrap();
            assert_eq!(state.buffer_size(), 100 * Particle::SIZE);
            assert_eq!(state.particle_buffers.len(), mode.buffer_count());
            assert_eq!(state.bind_groups.len(), mode.buffer_count());
            assert_eq!(state.work_groups, 2);

            for frame in 0..4 {
                let parity = mode.parity(frame);
                let write = state.write_buffer(parity).unwrap();
                assert!(std::ptr::eq(write, &state.particle_buffers[parity.write]));
                assert_eq!(write.size(), state.buffer_size());
            }

            state.release();
            assert!(state.is_released());
            state.release();
            assert!(state.is_released());
            assert!(state.write_buffer(mode.parity(0)).is_none());

            // encoding against a released flock records nothing
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            state.dispatch(&mut encoder, mode.parity(0));
            drop(encoder.finish());
        }
    }

    #[test]
    fn test_dispatch_writes_only_the_write_buffer() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let state =
            SimulationState::new(&device, FORMAT, &flock(100, BufferingMode::PingPong)).unwrap();
        let initial: Vec<f32> = bytemuck::cast_slice(&spawn_particles(100, 42)).to_vec();

        let parity = BufferingMode::PingPong.parity(0);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        state.dispatch(&mut encoder, parity);
        queue.submit(Some(encoder.finish()));

        let written = read_back(&device, &queue, &state.particle_buffers[parity.write]);
        let untouched = read_back(&device, &queue, &state.particle_buffers[parity.read]);
        assert_eq!(untouched, initial);
        assert_eq!(written.len(), initial.len());
        assert_ne!(written, initial);
    }

    #[test]
    fn test_oversized_flock_is_rejected_before_any_allocation() {
        let Some((device, _queue)) = test_device() else {
            return;
        };
        let limit = max_particles(device.limits().max_compute_workgroups_per_dimension);
        if limit == u32::MAX {
            return;
        }

        let oversized = flock(limit + 1, BufferingMode::PingPong);
        match SimulationState::new(&device, FORMAT, &oversized) {
            Err(GpuError::TooManyParticles { requested, max }) => {
                assert_eq!(requested, limit + 1);
                assert_eq!(max, limit);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("oversized flock was accepted"),
        }
    }
}
