//! Waypoint mission: drives the motion model through an ordered list of
//! cells, scans each plant the first time it is reached and finishes after
//! the last waypoint.

use crate::grid::OccupancyGrid;
use crate::motion::{MotionModel, Pose};
use log::{debug, info, warn};
use rover_common::{LogicalCoord, MissionStatus, Result, RoverError, SimParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Sensor readings taken at a plant cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub coord: LogicalCoord,
    pub plant_kind: Option<String>,
    pub moisture: Option<f32>,
    pub temperature: Option<f32>,
    /// Mission tick on which the scan happened.
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MissionEvent {
    WaypointReached { index: usize, coord: LogicalCoord },
    PlantScanned(ScanRecord),
    Completed { ticks: u64, distance_traveled: f32, scans: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissionState {
    /// Index of the waypoint being approached; equals the waypoint count once complete.
    pub waypoint_index: usize,
    pub distance_traveled: f32,
    /// Plant cells already scanned.
    pub visited: HashSet<LogicalCoord>,
    pub status: MissionStatus,
    pub ticks: u64,
}

/// End-of-run numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    pub status: MissionStatus,
    pub ticks: u64,
    pub waypoints_reached: usize,
    pub waypoint_count: usize,
    pub distance_traveled: f32,
    pub plants_scanned: usize,
    pub plants_on_grid: usize,
    /// Share of the grid's plants scanned, in percent.
    pub coverage_percent: f32,
}

#[derive(Debug, Clone)]
pub struct MissionSequencer {
    waypoints: Vec<LogicalCoord>,
    state: MissionState,
    motion: MotionModel,
    scans: Vec<ScanRecord>,
}

impl MissionSequencer {
    pub fn new(params: &SimParams) -> Self {
        MissionSequencer {
            waypoints: Vec::new(),
            state: MissionState::default(),
            motion: MotionModel::new(params),
            scans: Vec::new(),
        }
    }

    pub fn waypoints(&self) -> &[LogicalCoord] {
        &self.waypoints
    }

    /// Replaces the route. Any mission in progress is abandoned.
    pub fn set_waypoints(&mut self, waypoints: Vec<LogicalCoord>) {
        if matches!(self.state.status, MissionStatus::Running | MissionStatus::Paused) {
            warn!("Waypoints replaced during a mission; mission reset.");
        }
        self.waypoints = waypoints;
        self.reset();
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn status(&self) -> MissionStatus {
        self.state.status
    }

    pub fn scans(&self) -> &[ScanRecord] {
        &self.scans
    }

    pub fn motion(&self) -> &MotionModel {
        &self.motion
    }

    /// Waypoint being approached, if the mission has one.
    pub fn current_target(&self) -> Option<LogicalCoord> {
        self.waypoints.get(self.state.waypoint_index).copied()
    }

    /// Fraction of waypoints reached, `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.waypoints.is_empty() {
            return 0.0;
        }
        self.state.waypoint_index as f32 / self.waypoints.len() as f32
    }

    /// Begins the mission from the first waypoint with fresh counters.
    /// Fails with `EmptyPath` and leaves the status untouched when there are
    /// no waypoints.
    pub fn start(&mut self) -> Result<()> {
        if self.waypoints.is_empty() {
            warn!("Cannot start a mission without waypoints.");
            return Err(RoverError::EmptyPath);
        }
        self.clear_progress();
        self.state.status = MissionStatus::Running;
        info!("Mission started: {} waypoints.", self.waypoints.len());
        Ok(())
    }

    pub fn pause(&mut self) -> bool {
        if self.state.status != MissionStatus::Running {
            return false;
        }
        self.state.status = MissionStatus::Paused;
        info!("Mission paused at waypoint {}/{}.", self.state.waypoint_index, self.waypoints.len());
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state.status != MissionStatus::Paused {
            return false;
        }
        self.state.status = MissionStatus::Running;
        info!("Mission resumed.");
        true
    }

    /// Back to `Idle` with cleared counters, keeping the waypoints.
    pub fn reset(&mut self) {
        self.clear_progress();
        self.state.status = MissionStatus::Idle;
    }

    fn clear_progress(&mut self) {
        self.state = MissionState::default();
        self.scans.clear();
        self.motion.reset();
    }

    /// Advances the mission by one tick. Does nothing unless running.
    ///
    /// The only grid mutation is flagging a reached waypoint as explored.
    pub fn tick(&mut self, pose: &mut Pose, grid: &mut OccupancyGrid) -> Vec<MissionEvent> {
        let mut events = Vec::new();
        if self.state.status != MissionStatus::Running {
            return events;
        }
        let Some(target) = self.current_target() else {
            // Cursor ran past the route, e.g. after an external edit
            self.complete(&mut events);
            return events;
        };

        let before = pose.position;
        let update = self.motion.update(pose, target);
        self.state.distance_traveled += before.distance(pose.position);
        self.state.ticks += 1;

        if !update.arrived {
            return events;
        }

        let index = self.state.waypoint_index;
        debug!("Waypoint {} reached at {} (tick {}).", index, target, self.state.ticks);
        events.push(MissionEvent::WaypointReached { index, coord: target });

        let cell = grid.get(target);
        grid.mark_explored(target);
        if cell.is_plant() && self.state.visited.insert(target) {
            let scan = ScanRecord {
                coord: target,
                plant_kind: cell.plant_kind.clone(),
                moisture: cell.moisture,
                temperature: cell.temperature,
                tick: self.state.ticks,
            };
            info!(
                "Scanned {} at {}: moisture {:?}, temperature {:?}",
                scan.plant_kind.as_deref().unwrap_or("plant"),
                target,
                scan.moisture,
                scan.temperature
            );
            self.scans.push(scan.clone());
            events.push(MissionEvent::PlantScanned(scan));
        }

        // A repeated cell is a new leg; the model must report arrival again
        self.motion.reset();
        self.state.waypoint_index += 1;
        if self.state.waypoint_index >= self.waypoints.len() {
            self.complete(&mut events);
        }
        events
    }

    fn complete(&mut self, events: &mut Vec<MissionEvent>) {
        self.state.status = MissionStatus::Complete;
        info!(
            "Mission complete: {} ticks, {:.2} units travelled, {} plants scanned.",
            self.state.ticks,
            self.state.distance_traveled,
            self.scans.len()
        );
        events.push(MissionEvent::Completed {
            ticks: self.state.ticks,
            distance_traveled: self.state.distance_traveled,
            scans: self.scans.len(),
        });
    }

    pub fn summary(&self, grid: &OccupancyGrid) -> MissionSummary {
        let plants_on_grid = grid.plant_count();
        let plants_scanned = self.scans.len();
        let coverage_percent = if plants_on_grid == 0 {
            0.0
        } else {
            plants_scanned as f32 / plants_on_grid as f32 * 100.0
        };
        MissionSummary {
            status: self.state.status,
            ticks: self.state.ticks,
            waypoints_reached: self.state.waypoint_index.min(self.waypoints.len()),
            waypoint_count: self.waypoints.len(),
            distance_traveled: self.state.distance_traveled,
            plants_scanned,
            plants_on_grid,
            coverage_percent,
        }
    }
}
