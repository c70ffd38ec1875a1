use serde::{Deserialize, Serialize};

/// Runtime parameters derived from the configuration, read on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    // Grid & scale
    pub grid_size: u32,
    pub cell_scale: f32,      // Physical units per grid cell
    pub pixels_per_unit: f32, // Render scale, independent of cell_scale

    // Time
    pub dt: f32, // Seconds per tick

    // Motion (speed multiplier already applied where it belongs)
    pub max_speed: f32,           // Physical units per second
    pub acceleration: f32,        // Units/s^2 while aligned
    pub deceleration: f32,        // Units/s^2 while turning
    pub max_angular_step: f32,    // Radians per tick
    pub alignment_tolerance: f32, // Radians
    pub arrival_threshold: f32,   // Physical units
}

impl Default for SimParams {
    fn default() -> Self {
        crate::config::RoverConfig::default().get_sim_params()
    }
}
