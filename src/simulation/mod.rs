// src/simulation/mod.rs
//! Flock simulation
//!
//! Host-side particle layout and spawning, the immutable parameters, the
//! buffering discipline, and the GPU resources that run the kernel.

pub mod buffering;
pub mod params;
pub mod particle;
pub mod state;

pub use buffering::{BufferParity, BufferingMode};
pub use params::SimulationParams;
pub use particle::{
    spawn_particles, work_group_count, Particle, FLOATS_PER_PARTICLE, INITIAL_SPEED,
    PARTICLES_PER_GROUP,
};
pub use state::{max_particles, FlockDescriptor, SimulationState};
