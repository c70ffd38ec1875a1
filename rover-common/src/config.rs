use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::coords::MAX_GRID_SIZE;
use crate::sim_params::SimParams;
use std::path::Path;

// Grid dimensions and the physical size of one cell
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_grid_size")]
    pub size: u32,
    #[serde(default = "default_cell_scale")]
    pub cell_scale: f32,
}

// Render-side scale, only used by display conversions
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_pixels_per_unit")]
    pub pixels_per_unit: f32,
    #[serde(default = "default_viewport_extent")]
    pub viewport_width: f32,
    #[serde(default = "default_viewport_extent")]
    pub viewport_height: f32,
}

// Kinematic limits of the rover
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MotionConfig {
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "default_acceleration")]
    pub acceleration: f32,
    /// Falls back to `acceleration` when absent.
    #[serde(default)]
    pub deceleration: Option<f32>,
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f32,
    #[serde(default = "default_alignment_tolerance")]
    pub alignment_tolerance: f32,
    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold: f32,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f32,
}

// Tick pacing for the command-line runner
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,
    #[serde(default = "default_record_interval_ticks")]
    pub record_interval_ticks: u32,
}

// Seeded random garden, used when no template is named
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RandomGardenConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_plant_ratio")]
    pub plant_ratio: f32,
    #[serde(default = "default_obstacle_ratio")]
    pub obstacle_ratio: f32,
}

// What the rover should do: world source, route source, start pose
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MissionConfig {
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub random_garden: Option<RandomGardenConfig>,
    /// Explicit waypoints `[x, y]`, visited as listed.
    #[serde(default)]
    pub waypoints: Vec<[i32; 2]>,
    /// Stops joined by the path planner, visited as listed.
    #[serde(default)]
    pub stops: Vec<[i32; 2]>,
    /// Physical `[x, z]`; the rover is snapped to the first waypoint when absent.
    #[serde(default)]
    pub start_pose: Option<[f32; 2]>,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_snapshots: bool,
    #[serde(default = "default_true")]
    pub save_trajectory: bool,
    #[serde(default)]
    pub save_grid: bool,
    pub format: Option<String>, // Snapshot format: "json", "bincode", "messagepack"
}

/// Main rover configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct RoverConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { size: default_grid_size(), cell_scale: default_cell_scale() }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            pixels_per_unit: default_pixels_per_unit(),
            viewport_width: default_viewport_extent(),
            viewport_height: default_viewport_extent(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            max_speed: default_max_speed(),
            acceleration: default_acceleration(),
            deceleration: None,
            angular_speed: default_angular_speed(),
            alignment_tolerance: default_alignment_tolerance(),
            arrival_threshold: default_arrival_threshold(),
            speed_multiplier: default_speed_multiplier(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_rate_hz: default_tick_rate_hz(),
            max_ticks: default_max_ticks(),
            record_interval_ticks: default_record_interval_ticks(),
        }
    }
}

impl Default for RandomGardenConfig {
    fn default() -> Self {
        RandomGardenConfig {
            seed: 0,
            plant_ratio: default_plant_ratio(),
            obstacle_ratio: default_obstacle_ratio(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_snapshots: true,
            save_trajectory: true,
            save_grid: false,
            format: None,
        }
    }
}

impl RoverConfig {
    /// Loads the rover configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config in '{}'", path_ref.display()))?;

        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RoverConfig = toml::from_str(text)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.size == 0 || self.grid.size > MAX_GRID_SIZE {
            anyhow::bail!("grid.size must be between 1 and {}.", MAX_GRID_SIZE);
        }
        if !(self.grid.cell_scale > 0.0) {
            anyhow::bail!("grid.cell_scale must be positive.");
        }
        if !(self.display.pixels_per_unit > 0.0) {
            anyhow::bail!("display.pixels_per_unit must be positive.");
        }
        if !(self.display.viewport_width > 0.0 && self.display.viewport_height > 0.0) {
            anyhow::bail!("display viewport extents must be positive.");
        }
        let m = &self.motion;
        if !(m.max_speed > 0.0) || !(m.acceleration > 0.0) || !(m.angular_speed > 0.0) {
            anyhow::bail!("motion.max_speed, motion.acceleration and motion.angular_speed must be positive.");
        }
        if matches!(m.deceleration, Some(d) if !(d > 0.0)) {
            anyhow::bail!("motion.deceleration must be positive when set.");
        }
        if !(m.arrival_threshold > 0.0) {
            anyhow::bail!("motion.arrival_threshold must be positive.");
        }
        if !(m.speed_multiplier > 0.0) {
            anyhow::bail!("motion.speed_multiplier must be positive.");
        }
        if !(self.timing.tick_rate_hz > 0.0) {
            anyhow::bail!("timing.tick_rate_hz must be positive.");
        }
        if self.mission.template.is_some() && self.mission.random_garden.is_some() {
            anyhow::bail!("mission.template and mission.random_garden are mutually exclusive.");
        }
        if !self.mission.waypoints.is_empty() && !self.mission.stops.is_empty() {
            anyhow::bail!("mission.waypoints and mission.stops are mutually exclusive.");
        }
        if let Some(g) = &self.mission.random_garden {
            if !(0.0..=1.0).contains(&(g.plant_ratio + g.obstacle_ratio)) || g.plant_ratio < 0.0 || g.obstacle_ratio < 0.0 {
                anyhow::bail!("random_garden ratios must be non-negative and sum to at most 1.");
            }
        }
        Ok(())
    }

    /// Converts the configuration into parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let m = &self.motion;
        let dt = 1.0 / self.timing.tick_rate_hz;
        let multiplier = m.speed_multiplier;

        SimParams {
            grid_size: self.grid.size,
            cell_scale: self.grid.cell_scale,
            pixels_per_unit: self.display.pixels_per_unit,
            dt,
            max_speed: m.max_speed * multiplier,
            acceleration: m.acceleration * multiplier,
            // Braking is not sped up by the multiplier
            deceleration: m.deceleration.unwrap_or(m.acceleration),
            max_angular_step: m.angular_speed * multiplier * dt,
            alignment_tolerance: m.alignment_tolerance,
            arrival_threshold: m.arrival_threshold,
        }
    }
}

fn default_grid_size() -> u32 { 5 }
fn default_cell_scale() -> f32 { 2.0 }
fn default_pixels_per_unit() -> f32 { 60.0 }
fn default_viewport_extent() -> f32 { 600.0 }
fn default_max_speed() -> f32 { 2.0 }
fn default_acceleration() -> f32 { 0.5 }
fn default_angular_speed() -> f32 { 1.5 }
fn default_alignment_tolerance() -> f32 { 0.5 }
fn default_arrival_threshold() -> f32 { 0.3 }
fn default_speed_multiplier() -> f32 { 1.0 }
fn default_tick_rate_hz() -> f32 { 60.0 }
fn default_max_ticks() -> u32 { 36_000 } // Ten simulated minutes at 60 Hz
fn default_record_interval_ticks() -> u32 { 30 }
fn default_plant_ratio() -> f32 { 0.3 }
fn default_obstacle_ratio() -> f32 { 0.1 }
fn default_base_filename() -> String { "rover_run".to_string() }
fn default_true() -> bool { true }
