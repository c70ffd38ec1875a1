pub mod config;
pub mod coords;
pub mod error;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{RoverConfig, GridConfig, DisplayConfig, MotionConfig, TimingConfig, MissionConfig, RandomGardenConfig, OutputConfig};
pub use coords::{CoordinateSystem, GridBounds, LogicalCoord, Viewport, MAX_GRID_SIZE, check_grid_size, from_physical, to_physical};
pub use error::{Result, RoverError};
pub use sim_params::SimParams;
pub use snapshot::{MissionStatus, Snapshot};
pub use vecmath::{Vec2, angle_difference, angle_to_vec, normalize_angle, vec_to_angle};
