//! Error types surfaced to callers of the rover core.
//!
//! Recoverable editing problems (out-of-bounds writes, unreachable goals)
//! are logged and degraded instead; only the variants below reach callers.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoverError {
    /// A mission was started without any waypoints.
    #[error("Cannot start mission: waypoint list is empty")]
    EmptyPath,

    /// Non-finite or non-integer input where a grid coordinate was expected.
    #[error("Invalid coordinate ({x}, {y})")]
    InvalidCoordinate { x: f64, y: f64 },

    #[error("Invalid grid size {0}: must be between 1 and 1048576")]
    InvalidGridSize(u32),

    #[error("Unknown garden template '{0}'")]
    UnknownTemplate(String),

    /// Malformed grid export payload.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, RoverError>;
