use glam::Vec3;

/// Tuning values for the collision layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhysicsConfig {
    /// Gravity vector (Z is up)
    pub gravity: Vec3,
    /// Root-bone displacement above which a resolution pass is abandoned
    pub max_root_move: f32,
    /// Sub-steps per bone radius of travel (`floor(scale * len / radius) + 1`)
    pub substep_scale: f32,
    /// Maximum objects recorded per bone collision node
    pub collision_node_capacity: usize,
    /// Cosine between horizontal reaction and move below which a wall is hit
    pub critical_wall_component: f32,
    /// Vertical reaction needed to confirm a floor/ceiling probe hit
    pub vertical_hit_epsilon: f32,
    /// Contact prediction distance used for ghost probe queries
    pub contact_prediction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -4500.0),
            max_root_move: 1024.0,
            substep_scale: 2.0,
            collision_node_capacity: 4,
            critical_wall_component: -0.707,
            vertical_hit_epsilon: 0.1,
            contact_prediction: 0.0,
        }
    }
}
