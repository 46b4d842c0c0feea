//! Immutable flocking parameters

/// Per-run flocking parameters, uploaded once as a uniform buffer.
///
/// The trailing padding keeps the struct at 32 bytes so it satisfies the
/// uniform buffer layout rules of the kernel's `SimParams`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimulationParams {
    pub delta_time: f32,
    pub max_force: f32,
    pub max_speed: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub separation_weight: f32,
    pub perception_radius: f32,
    pub _padding: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            delta_time: 0.016,
            max_force: 0.4,
            max_speed: 1.0,
            alignment_weight: 0.8,
            cohesion_weight: 0.7,
            separation_weight: 0.8,
            perception_radius: 0.3,
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<SimulationParams>(), 32);
        assert_eq!(std::mem::size_of::<SimulationParams>() % 16, 0);
    }
}
