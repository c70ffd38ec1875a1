//! Rotate-then-drive kinematics toward a single waypoint.
//!
//! Each update turns the heading toward the target by at most the per-tick
//! angular step, accelerates while roughly aligned and brakes otherwise,
//! then integrates the position along the heading.

use log::trace;
use rover_common::{
    angle_difference, angle_to_vec, normalize_angle, vec_to_angle, CoordinateSystem, LogicalCoord,
    SimParams, Vec2,
};
use serde::{Deserialize, Serialize};

/// Physical state of the rover. `position.y` carries the physical z axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    /// Radians, wrapped to `[-PI, PI)`.
    pub heading: f32,
    /// Forward speed, never negative.
    pub velocity: f32,
}

impl Pose {
    pub fn new(position: Vec2, heading: f32) -> Self {
        Pose { position, heading: normalize_angle(heading), velocity: 0.0 }
    }

    /// At rest on the centre of `coord`, facing +x.
    pub fn at_cell(coord: LogicalCoord, coords: &CoordinateSystem) -> Self {
        Pose::new(coords.to_physical(coord), 0.0)
    }

    /// Grid cell under the rover, if it is inside the grid.
    pub fn logical_cell(&self, coords: &CoordinateSystem) -> Option<LogicalCoord> {
        coords.cell_at_physical(self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Approaching,
    Arrived,
}

/// Result of one [`MotionModel::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionUpdate {
    pub phase: MotionPhase,
    /// True only on the tick the target was reached.
    pub arrived: bool,
    pub distance_to_target: f32,
    /// Signed heading error left after this tick's turn.
    pub heading_error: f32,
}

#[derive(Debug, Clone)]
pub struct MotionModel {
    params: SimParams,
    target: Option<LogicalCoord>,
    phase: MotionPhase,
}

impl MotionModel {
    pub fn new(params: &SimParams) -> Self {
        MotionModel { params: params.clone(), target: None, phase: MotionPhase::Approaching }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn target(&self) -> Option<LogicalCoord> {
        self.target
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Forgets the current target so the next update starts a fresh approach.
    pub fn reset(&mut self) {
        self.target = None;
        self.phase = MotionPhase::Approaching;
    }

    /// Advances `pose` one tick toward `target`.
    ///
    /// On arrival the pose is snapped onto the target and stopped, and
    /// `arrived` is reported once. Further updates with the same target keep
    /// the pose there without reporting arrival again.
    pub fn update(&mut self, pose: &mut Pose, target: LogicalCoord) -> MotionUpdate {
        if self.target != Some(target) {
            self.target = Some(target);
            self.phase = MotionPhase::Approaching;
        }

        let p = self.params.clone();
        let goal = rover_common::to_physical(target, p.cell_scale);

        if self.phase == MotionPhase::Arrived {
            pose.position = goal;
            pose.velocity = 0.0;
            return MotionUpdate {
                phase: MotionPhase::Arrived,
                arrived: false,
                distance_to_target: 0.0,
                heading_error: 0.0,
            };
        }

        let to_goal = goal - pose.position;
        if to_goal.length() < p.arrival_threshold {
            return self.arrive(pose, goal);
        }

        // Turn toward the target, never past it
        let desired = vec_to_angle(to_goal);
        let error = angle_difference(pose.heading, desired);
        let turn = error.abs().min(p.max_angular_step).copysign(error);
        pose.heading = normalize_angle(pose.heading + turn);

        if error.abs() < p.alignment_tolerance {
            pose.velocity = (pose.velocity + p.acceleration * p.dt).min(p.max_speed);
        } else {
            pose.velocity = (pose.velocity - p.deceleration * p.dt).max(0.0);
        }

        pose.position = pose.position + angle_to_vec(pose.heading) * (pose.velocity * p.dt);

        let remaining = goal.distance(pose.position);
        if remaining < p.arrival_threshold {
            return self.arrive(pose, goal);
        }

        trace!(
            "Approaching {}: dist {:.3}, heading {:.3}, v {:.3}",
            target, remaining, pose.heading, pose.velocity
        );
        MotionUpdate {
            phase: MotionPhase::Approaching,
            arrived: false,
            distance_to_target: remaining,
            heading_error: error - turn,
        }
    }

    fn arrive(&mut self, pose: &mut Pose, goal: Vec2) -> MotionUpdate {
        self.phase = MotionPhase::Arrived;
        pose.position = goal;
        pose.velocity = 0.0;
        MotionUpdate {
            phase: MotionPhase::Arrived,
            arrived: true,
            distance_to_target: 0.0,
            heading_error: 0.0,
        }
    }
}
