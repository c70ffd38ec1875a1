//! Headless garden rover: occupancy grid, A* planner, rover kinematics and
//! a waypoint mission with plant scanning.

pub mod grid;
pub mod mission;
pub mod motion;
pub mod planner;
pub mod simulation;
pub mod templates;

pub use grid::{Cell, CellPatch, CellType, GridExport, OccupancyGrid};
pub use mission::{MissionEvent, MissionSequencer, MissionSummary, ScanRecord};
pub use motion::{MotionModel, Pose};
pub use simulation::RoverSimulation;
pub use templates::{template_by_id, GardenTemplate};
