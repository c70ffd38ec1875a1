use crate::grid::{CellPatch, GridExport, OccupancyGrid};
use crate::mission::{MissionEvent, MissionSequencer, MissionSummary};
use crate::motion::Pose;
use crate::planner;
use crate::templates::{self, template_by_id};
use log::{debug, info, warn};
use rover_common::{
    CoordinateSystem, LogicalCoord, MissionStatus, Result, RoverConfig, RoverError, SimParams,
    Snapshot, Vec2, Viewport,
};
use std::collections::HashSet;

/// One rover session: the world, the rover pose and its mission.
///
/// The session owns every piece of mutable state; collaborators receive
/// borrows for the duration of a call.
pub struct RoverSimulation {
    /// The configuration the session was built from.
    config: RoverConfig,
    /// Runtime parameters derived from `config`.
    params: SimParams,
    coords: CoordinateSystem,
    grid: OccupancyGrid,
    pose: Pose,
    mission: MissionSequencer,
    /// Ticks executed while the mission was running.
    current_tick: u64,
    /// Name of the loaded template, if any.
    template_id: Option<String>,
    /// Stores collected snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl RoverSimulation {
    /// Creates an empty world of the configured size with the rover at the origin.
    pub fn new(config: RoverConfig) -> Result<Self> {
        let params = config.get_sim_params();
        let coords = CoordinateSystem::new(params.grid_size, params.cell_scale, params.pixels_per_unit)?;
        let grid = OccupancyGrid::new(params.grid_size)?;
        let mission = MissionSequencer::new(&params);
        debug!("Session parameters: {:#?}", params);

        Ok(RoverSimulation {
            config,
            params,
            coords,
            grid,
            pose: Pose::default(),
            mission,
            current_tick: 0,
            template_id: None,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Applies the `[mission]` section: world source, route source and start pose.
    pub fn apply_mission_config(&mut self) -> Result<()> {
        let mission = self.config.mission.clone();

        if let Some(id) = &mission.template {
            self.load_template(id)?;
        } else if let Some(random) = &mission.random_garden {
            self.load_random_garden(self.params.grid_size, random.seed, random.plant_ratio, random.obstacle_ratio)?;
        }

        if !mission.waypoints.is_empty() {
            self.set_waypoints(mission.waypoints.iter().map(|&[x, y]| LogicalCoord::new(x, y)).collect());
        } else if !mission.stops.is_empty() {
            let stops: Vec<_> = mission.stops.iter().map(|&[x, y]| LogicalCoord::new(x, y)).collect();
            self.plan_waypoints(&stops, &HashSet::new());
        }

        if let Some([x, z]) = mission.start_pose {
            self.pose = Pose::new(Vec2::new(x, z), 0.0);
        }
        Ok(())
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    pub fn coords(&self) -> &CoordinateSystem {
        &self.coords
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn mission(&self) -> &MissionSequencer {
        &self.mission
    }

    pub fn status(&self) -> MissionStatus {
        self.mission.status()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    /// Editor write into the world. Out-of-bounds coordinates are rejected.
    pub fn set_cell(&mut self, coord: LogicalCoord, patch: CellPatch) -> bool {
        self.grid.set(coord, patch)
    }

    pub fn clear_cell(&mut self, coord: LogicalCoord) -> bool {
        self.grid.remove(coord).is_some()
    }

    /// Changes the grid size. Existing cells keep their coordinates and the
    /// rover keeps its physical position. Returns how many cells were pruned.
    pub fn resize(&mut self, size: u32) -> Result<usize> {
        self.coords.resize(size)?;
        let pruned = self.grid.resize(size)?;
        self.params.grid_size = size;

        let outside = self.mission.waypoints().iter().filter(|w| !self.coords.contains(**w)).count();
        if outside > 0 {
            warn!("{} waypoints now lie outside the {}x{} grid.", outside, size, size);
        }
        Ok(pruned)
    }

    /// Pixel area front-ends draw the grid into, from `[display]`.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.config.display.viewport_width, self.config.display.viewport_height)
    }

    /// Grid cell under a viewport pixel, for click-to-edit front-ends.
    pub fn cell_under_pixel(&self, pixel: Vec2) -> Option<LogicalCoord> {
        self.coords.cell_under_display(pixel, self.viewport())
    }

    /// Render-only scale change; leaves every physical position untouched.
    pub fn set_render_scale(&mut self, pixels_per_unit: f32) {
        self.coords.set_pixels_per_unit(pixels_per_unit);
        self.params.pixels_per_unit = self.coords.pixels_per_unit();
    }

    /// Loads a built-in layout and its default route. A default route that
    /// crosses obstacles is re-planned through its reachable waypoints.
    pub fn load_template(&mut self, id: &str) -> Result<()> {
        let template = template_by_id(id)?;
        let grid = template.build_grid()?;
        self.coords.resize(template.grid_size)?;
        self.params.grid_size = template.grid_size;
        self.grid = grid;

        let blocked = template.blocked_waypoints();
        let waypoints = if blocked.is_empty() {
            template.default_waypoints()
        } else {
            warn!(
                "Template '{}' route crosses {} obstacle cells; re-planning around them.",
                id,
                blocked.len()
            );
            let stops: Vec<_> = template
                .default_waypoints()
                .into_iter()
                .filter(|w| !blocked.contains(w))
                .collect();
            planner::plan_route(&self.grid, &stops, &HashSet::new())
        };

        info!(
            "Loaded template '{}' ({}): {} plants, {} waypoints.",
            template.id,
            template.name,
            self.grid.plant_count(),
            waypoints.len()
        );
        self.template_id = Some(template.id.to_string());
        self.set_waypoints(waypoints);
        Ok(())
    }

    /// Replaces the world with a seeded random garden and clears the route.
    pub fn load_random_garden(&mut self, size: u32, seed: u64, plant_ratio: f32, obstacle_ratio: f32) -> Result<()> {
        let grid = templates::random_garden(size, seed, plant_ratio, obstacle_ratio)?;
        self.coords.resize(size)?;
        self.params.grid_size = size;
        self.grid = grid;
        self.template_id = None;
        self.set_waypoints(Vec::new());
        Ok(())
    }

    /// Replaces the route and parks the rover on its first waypoint.
    pub fn set_waypoints(&mut self, waypoints: Vec<LogicalCoord>) {
        if let Some(first) = waypoints.first() {
            self.pose = Pose::at_cell(*first, &self.coords);
        }
        self.mission.set_waypoints(waypoints);
        self.current_tick = 0;
        self.recorded_snapshots.clear();
    }

    /// Plans a route through `stops` and installs it. Returns the waypoint count.
    pub fn plan_waypoints(&mut self, stops: &[LogicalCoord], exclusions: &HashSet<LogicalCoord>) -> usize {
        let route = planner::plan_route(&self.grid, stops, exclusions);
        let count = route.len();
        self.set_waypoints(route);
        count
    }

    /// Snaps the rover onto the first waypoint at rest and starts the mission.
    pub fn start_mission(&mut self) -> Result<()> {
        let first = self.mission.waypoints().first().copied().ok_or(RoverError::EmptyPath)?;
        self.start_mission_from(Pose::at_cell(first, &self.coords))
    }

    /// Starts the mission with the rover at an arbitrary pose.
    pub fn start_mission_from(&mut self, pose: Pose) -> Result<()> {
        self.mission.start()?;
        self.pose = pose;
        self.current_tick = 0;
        self.recorded_snapshots.clear();
        self.record_snapshot();
        Ok(())
    }

    pub fn pause(&mut self) -> bool {
        self.mission.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.mission.resume()
    }

    /// Back to idle with the rover parked on the first waypoint.
    pub fn reset(&mut self) {
        self.mission.reset();
        if let Some(first) = self.mission.waypoints().first() {
            self.pose = Pose::at_cell(*first, &self.coords);
        }
        self.current_tick = 0;
        self.recorded_snapshots.clear();
        info!("Session reset.");
    }

    /// Advances the mission one tick. Does nothing unless running.
    pub fn tick(&mut self) -> Vec<MissionEvent> {
        if self.mission.status() != MissionStatus::Running {
            return Vec::new();
        }
        let events = self.mission.tick(&mut self.pose, &mut self.grid);
        self.current_tick += 1;

        let interval = self.config.timing.record_interval_ticks as u64;
        let finished = self.mission.status() == MissionStatus::Complete;
        if finished || (interval > 0 && self.current_tick % interval == 0) {
            self.record_snapshot();
        }
        events
    }

    /// Ticks until the mission stops running or `max_ticks` is reached.
    /// Returns the number of ticks executed.
    pub fn run(&mut self, max_ticks: u64) -> u64 {
        let mut executed = 0;
        while executed < max_ticks && self.mission.status() == MissionStatus::Running {
            self.tick();
            executed += 1;
        }
        if self.mission.status() == MissionStatus::Running {
            warn!("Tick budget of {} exhausted before the mission completed.", max_ticks);
        }
        executed
    }

    /// Current state as a snapshot, without storing it.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.mission.state();
        Snapshot {
            tick: self.current_tick,
            time: self.current_tick as f32 * self.params.dt,
            x: self.pose.position.x,
            z: self.pose.position.y,
            heading: self.pose.heading,
            velocity: self.pose.velocity,
            waypoint_index: state.waypoint_index,
            distance_traveled: state.distance_traveled,
            status: state.status,
            scans: self.mission.scans().len() as u32,
        }
    }

    /// Stores the current state unless the previous snapshot was taken on the same tick.
    pub fn record_snapshot(&mut self) {
        let snapshot = self.snapshot();
        if self.recorded_snapshots.last().map(|s| s.tick) == Some(snapshot.tick) {
            return;
        }
        debug!(
            "Snapshot t={:.2}s ({}, {}) v={:.2}",
            snapshot.time, snapshot.x, snapshot.z, snapshot.velocity
        );
        self.recorded_snapshots.push(snapshot);
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    pub fn summary(&self) -> MissionSummary {
        self.mission.summary(&self.grid)
    }

    pub fn export_grid(&self) -> GridExport {
        self.grid.export()
    }

    /// Replaces the world with an exported grid, adopting its size.
    pub fn import_grid(&mut self, data: GridExport) -> Result<()> {
        let grid = OccupancyGrid::import(data)?;
        self.coords.resize(grid.size())?;
        self.params.grid_size = grid.size();
        self.grid = grid;
        self.template_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RoverSimulation {
        RoverSimulation::new(RoverConfig::default()).unwrap()
    }

    #[test]
    fn viewport_pixels_map_to_cells() {
        let mut sim = session();
        assert_eq!(sim.viewport(), Viewport::new(600.0, 600.0));
        assert_eq!(sim.cell_under_pixel(Vec2::new(300.0, 300.0)), Some(LogicalCoord::ORIGIN));
        assert_eq!(sim.cell_under_pixel(Vec2::new(420.0, 180.0)), Some(LogicalCoord::new(1, 1)));
        assert_eq!(sim.cell_under_pixel(Vec2::new(0.0, 0.0)), None);

        sim.set_render_scale(30.0);
        assert_eq!(sim.cell_under_pixel(Vec2::new(360.0, 240.0)), Some(LogicalCoord::new(1, 1)));
    }

    #[test]
    fn oversized_resize_is_rejected() {
        let mut sim = session();
        let too_big = rover_common::MAX_GRID_SIZE + 1;
        assert_eq!(sim.resize(too_big), Err(RoverError::InvalidGridSize(too_big)));
        assert_eq!(sim.coords().size(), 5);
        assert_eq!(sim.grid().size(), 5);
    }

    #[test]
    fn start_without_waypoints_fails() {
        let mut sim = session();
        assert_eq!(sim.start_mission(), Err(RoverError::EmptyPath));
        assert_eq!(sim.status(), MissionStatus::Idle);
        assert!(sim.tick().is_empty());
    }

    #[test]
    fn start_snaps_to_first_waypoint() {
        let mut sim = session();
        sim.set_waypoints(vec![LogicalCoord::new(1, 1), LogicalCoord::new(1, 0)]);
        sim.start_mission().unwrap();
        assert_eq!(sim.pose().position, Vec2::new(2.0, -2.0));
        assert_eq!(sim.pose().velocity, 0.0);
        assert_eq!(sim.get_recorded_snapshots().len(), 1);
    }

    #[test]
    fn template_session_completes() {
        let mut sim = session();
        sim.load_template("small_home").unwrap();
        sim.start_mission().unwrap();
        sim.run(100_000);
        assert_eq!(sim.status(), MissionStatus::Complete);
        let summary = sim.summary();
        assert_eq!(summary.waypoints_reached, 8);
        // Plants on the route sit at flat indices 1, 11, 21 and 23
        assert_eq!(summary.plants_scanned, 4);
        assert_eq!(summary.plants_on_grid, 10);
        let last = sim.get_recorded_snapshots().last().unwrap();
        assert_eq!(last.status, MissionStatus::Complete);
    }

    #[test]
    fn research_route_avoids_obstacles() {
        let mut sim = session();
        sim.load_template("research").unwrap();
        let grid = sim.grid();
        assert!(sim.mission().waypoints().iter().all(|w| !grid.get(*w).is_obstacle()));
    }

    #[test]
    fn resize_keeps_pose_and_prunes() {
        let mut sim = session();
        sim.set_cell(LogicalCoord::new(2, 2), CellPatch::of_type(crate::grid::CellType::Obstacle));
        sim.set_waypoints(vec![LogicalCoord::new(1, 1)]);
        let before = *sim.pose();
        assert_eq!(sim.resize(3).unwrap(), 1);
        assert_eq!(*sim.pose(), before);
        assert_eq!(sim.coords().size(), 3);
        assert!(sim.resize(0).is_err());
    }

    #[test]
    fn render_scale_does_not_move_rover() {
        let mut sim = session();
        sim.set_waypoints(vec![LogicalCoord::new(-1, 2)]);
        let before = *sim.pose();
        sim.set_render_scale(120.0);
        assert_eq!(*sim.pose(), before);
        assert_eq!(sim.params().pixels_per_unit, 120.0);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut sim = session();
        sim.set_waypoints(vec![LogicalCoord::new(0, 0), LogicalCoord::new(2, 0)]);
        sim.start_mission().unwrap();
        sim.run(30);
        sim.reset();
        assert_eq!(sim.status(), MissionStatus::Idle);
        assert_eq!(sim.pose().position, Vec2::zero());
        assert!(sim.get_recorded_snapshots().is_empty());
    }
}
