use serde::{Serialize, Deserialize};
use std::fmt;

/// Lifecycle of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Complete,
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissionStatus::Idle => "IDLE",
            MissionStatus::Running => "RUNNING",
            MissionStatus::Paused => "PAUSED",
            MissionStatus::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// A snapshot of the rover and mission state at a specific tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick counter at which the snapshot was taken.
    pub tick: u64,
    /// Simulated time in seconds (`tick * dt`).
    pub time: f32,
    /// Physical position of the rover.
    pub x: f32,
    pub z: f32,
    /// Heading in radians, wrapped to `[-PI, PI)`.
    pub heading: f32,
    pub velocity: f32,
    /// Index of the waypoint currently being approached.
    pub waypoint_index: usize,
    pub distance_traveled: f32,
    pub status: MissionStatus,
    /// Number of distinct plants scanned so far.
    pub scans: u32,
}
