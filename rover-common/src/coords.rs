//! Logical, physical and display coordinate spaces.
//!
//! Logical coordinates are integer grid cells centred on the origin. Physical
//! coordinates are continuous ground-plane positions `(x, z)` used by motion
//! integration, stored in a [`Vec2`] whose `y` component holds `z`. Display
//! coordinates are viewport pixels and only matter to rendering/editing
//! front-ends.
//!
//! The second axis is flipped on the way to physical space: logical `+y`
//! points away from the viewer, which is physical `-z`.

use crate::error::{Result, RoverError};
use crate::vecmath::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted grid side. Up to here every in-bounds cell survives the
/// round trip through `f32` physical space.
pub const MAX_GRID_SIZE: u32 = 1 << 20;

/// Accepts `1..=MAX_GRID_SIZE`.
pub fn check_grid_size(size: u32) -> Result<u32> {
    if size == 0 || size > MAX_GRID_SIZE {
        return Err(RoverError::InvalidGridSize(size));
    }
    Ok(size)
}

/// Integer grid cell, origin-centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalCoord {
    pub x: i32,
    pub y: i32,
}

impl LogicalCoord {
    pub const ORIGIN: LogicalCoord = LogicalCoord { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        LogicalCoord { x, y }
    }

    /// Validates untyped input (editor fields, imported payloads).
    /// Rejects non-finite, fractional and out-of-range values.
    pub fn try_from_f64(x: f64, y: f64) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64;
        if valid(x) && valid(y) {
            Ok(LogicalCoord::new(x as i32, y as i32))
        } else {
            Err(RoverError::InvalidCoordinate { x, y })
        }
    }

    /// Manhattan distance in cells.
    pub fn manhattan(&self, other: LogicalCoord) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// 4-connected neighbours in a fixed order: +x, -x, +y, -y.
    /// Saturates at the `i32` range instead of overflowing.
    pub fn neighbors4(&self) -> [LogicalCoord; 4] {
        [
            LogicalCoord::new(self.x.saturating_add(1), self.y),
            LogicalCoord::new(self.x.saturating_sub(1), self.y),
            LogicalCoord::new(self.x, self.y.saturating_add(1)),
            LogicalCoord::new(self.x, self.y.saturating_sub(1)),
        ]
    }

    /// 8-connected neighbours: the four edge neighbours followed by the diagonals.
    pub fn neighbors8(&self) -> [LogicalCoord; 8] {
        let [e, w, n, s] = self.neighbors4();
        [
            e,
            w,
            n,
            s,
            LogicalCoord::new(e.x, n.y),
            LogicalCoord::new(e.x, s.y),
            LogicalCoord::new(w.x, n.y),
            LogicalCoord::new(w.x, s.y),
        ]
    }
}

impl From<(i32, i32)> for LogicalCoord {
    fn from((x, y): (i32, i32)) -> Self {
        LogicalCoord::new(x, y)
    }
}

impl fmt::Display for LogicalCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Inclusive coordinate range of a square grid of `size` cells per side.
///
/// `min = -floor(n/2)` and `max = n - floor(n/2) - 1`, so even sizes extend one
/// cell further on the negative side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub size: u32,
    pub min: i32,
    pub max: i32,
}

impl GridBounds {
    pub fn for_size(size: u32) -> Self {
        let n = size as i64;
        let half = n / 2;
        GridBounds {
            size,
            min: (-half) as i32,
            max: (n - half - 1) as i32,
        }
    }

    pub fn contains(&self, coord: LogicalCoord) -> bool {
        coord.x >= self.min && coord.x <= self.max && coord.y >= self.min && coord.y <= self.max
    }

    /// Number of cells along one side (`max - min + 1`).
    pub fn span(&self) -> u32 {
        (self.max as i64 - self.min as i64 + 1) as u32
    }

    pub fn cell_count(&self) -> usize {
        self.size as usize * self.size as usize
    }

    /// Nearest in-bounds coordinate.
    pub fn clamp(&self, coord: LogicalCoord) -> LogicalCoord {
        LogicalCoord::new(coord.x.clamp(self.min, self.max), coord.y.clamp(self.min, self.max))
    }

    /// Legacy flat index (`row * n + col`), rows counted down from `max` y.
    pub fn index_of(&self, coord: LogicalCoord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let row = (self.max - coord.y) as usize;
        let col = (coord.x - self.min) as usize;
        Some(row * self.size as usize + col)
    }

    /// Inverse of [`GridBounds::index_of`].
    pub fn coord_at(&self, index: usize) -> Option<LogicalCoord> {
        let n = self.size as usize;
        if n == 0 || index >= n * n {
            return None;
        }
        let row = (index / n) as i32;
        let col = (index % n) as i32;
        Some(LogicalCoord::new(self.min + col, self.max - row))
    }

    /// Every in-bounds coordinate, rows from max y down to min y, each row
    /// from min x to max x. Matches the legacy flat index order.
    pub fn iter(&self) -> impl Iterator<Item = LogicalCoord> {
        let (min, max) = (self.min, self.max);
        (min..=max).rev().flat_map(move |y| (min..=max).map(move |x| LogicalCoord::new(x, y)))
    }
}

/// Logical -> physical: `(x * scale, -y * scale)`.
pub fn to_physical(coord: LogicalCoord, cell_scale: f32) -> Vec2 {
    let scale = cell_scale as f64;
    Vec2::new((coord.x as f64 * scale) as f32, (-(coord.y as f64) * scale) as f32)
}

/// Physical -> logical, rounding to the nearest cell centre.
/// Exact inverse of [`to_physical`] for every integer coordinate.
pub fn from_physical(point: Vec2, cell_scale: f32) -> Result<LogicalCoord> {
    if !point.is_finite() || !(cell_scale > 0.0) || !cell_scale.is_finite() {
        return Err(RoverError::InvalidCoordinate {
            x: point.x as f64,
            y: point.y as f64,
        });
    }
    let scale = cell_scale as f64;
    let x = (point.x as f64 / scale).round();
    let y = (-(point.y as f64) / scale).round();
    LogicalCoord::try_from_f64(x, y)
}

/// Pixel size of the area the grid is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Viewport { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Bidirectional mapping between the three coordinate spaces for one session.
///
/// `cell_scale` (physical units per grid cell) and `pixels_per_unit`
/// (render scale) are independent; neither a resize nor a render-scale change
/// alters physical positions already handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    bounds: GridBounds,
    cell_scale: f32,
    pixels_per_unit: f32,
}

impl CoordinateSystem {
    pub fn new(size: u32, cell_scale: f32, pixels_per_unit: f32) -> Result<Self> {
        check_grid_size(size)?;
        Ok(CoordinateSystem {
            bounds: GridBounds::for_size(size),
            cell_scale,
            pixels_per_unit,
        })
    }

    /// Bounds for an arbitrary grid size.
    pub fn bounds(size: u32) -> GridBounds {
        GridBounds::for_size(size)
    }

    pub fn current_bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn size(&self) -> u32 {
        self.bounds.size
    }

    pub fn cell_scale(&self) -> f32 {
        self.cell_scale
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }

    /// Updates bounds only. Stored cells are pruned by the grid, not here.
    pub fn resize(&mut self, size: u32) -> Result<()> {
        check_grid_size(size)?;
        self.bounds = GridBounds::for_size(size);
        Ok(())
    }

    pub fn set_pixels_per_unit(&mut self, pixels_per_unit: f32) {
        if pixels_per_unit > 0.0 && pixels_per_unit.is_finite() {
            self.pixels_per_unit = pixels_per_unit;
        } else {
            log::warn!("Ignoring invalid render scale {}", pixels_per_unit);
        }
    }

    pub fn contains(&self, coord: LogicalCoord) -> bool {
        self.bounds.contains(coord)
    }

    pub fn to_physical(&self, coord: LogicalCoord) -> Vec2 {
        to_physical(coord, self.cell_scale)
    }

    pub fn from_physical(&self, point: Vec2) -> Result<LogicalCoord> {
        from_physical(point, self.cell_scale)
    }

    /// Cell containing a physical point, or `None` when the point is invalid
    /// or falls outside the current bounds.
    pub fn cell_at_physical(&self, point: Vec2) -> Option<LogicalCoord> {
        self.from_physical(point).ok().filter(|c| self.bounds.contains(*c))
    }

    /// Physical point -> viewport pixel. Screen y grows downward, which is
    /// physical +z, so no extra flip is needed here.
    pub fn world_to_display(&self, point: Vec2, viewport: Viewport) -> Vec2 {
        point.scale(self.pixels_per_unit) + viewport.center()
    }

    pub fn display_to_world(&self, pixel: Vec2, viewport: Viewport) -> Vec2 {
        (pixel - viewport.center()) / self.pixels_per_unit
    }

    /// Grid cell under a viewport pixel, for click-to-edit front-ends.
    pub fn cell_under_display(&self, pixel: Vec2, viewport: Viewport) -> Option<LogicalCoord> {
        self.cell_at_physical(self.display_to_world(pixel, viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_for_odd_and_even_sizes() {
        assert_eq!(GridBounds::for_size(5), GridBounds { size: 5, min: -2, max: 2 });
        assert_eq!(GridBounds::for_size(6), GridBounds { size: 6, min: -3, max: 2 });
        assert_eq!(GridBounds::for_size(1), GridBounds { size: 1, min: 0, max: 0 });
        for n in 1..64 {
            assert_eq!(GridBounds::for_size(n).span(), n);
        }
    }

    #[test]
    fn physical_axis_is_flipped() {
        let p = to_physical(LogicalCoord::new(1, 2), 2.0);
        assert_eq!(p, Vec2::new(2.0, -4.0));
        assert_eq!(from_physical(p, 2.0), Ok(LogicalCoord::new(1, 2)));
    }

    #[test]
    fn from_physical_rejects_non_finite() {
        let err = from_physical(Vec2::new(f32::NAN, 0.0), 1.0).unwrap_err();
        assert!(matches!(err, RoverError::InvalidCoordinate { .. }));
        assert!(from_physical(Vec2::new(0.0, 0.0), 0.0).is_err());
    }

    #[test]
    fn try_from_f64_rejects_fractions() {
        assert_eq!(LogicalCoord::try_from_f64(-3.0, 4.0), Ok(LogicalCoord::new(-3, 4)));
        assert!(LogicalCoord::try_from_f64(0.5, 0.0).is_err());
        assert!(LogicalCoord::try_from_f64(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn flat_index_top_left_is_zero() {
        let b = GridBounds::for_size(5);
        assert_eq!(b.index_of(LogicalCoord::new(-2, 2)), Some(0));
        assert_eq!(b.index_of(LogicalCoord::new(2, -2)), Some(24));
        assert_eq!(b.coord_at(7), Some(LogicalCoord::new(0, 1)));
        assert_eq!(b.coord_at(25), None);
        assert_eq!(b.index_of(LogicalCoord::new(3, 0)), None);
    }

    #[test]
    fn iteration_order_matches_flat_index() {
        let b = GridBounds::for_size(4);
        for (i, c) in b.iter().enumerate() {
            assert_eq!(b.index_of(c), Some(i));
        }
        assert_eq!(b.iter().count(), 16);
    }

    #[test]
    fn display_round_trip_and_cell_lookup() {
        let cs = CoordinateSystem::new(5, 2.0, 60.0).unwrap();
        let vp = Viewport::new(600.0, 400.0);
        let world = cs.to_physical(LogicalCoord::new(1, 1));
        let px = cs.world_to_display(world, vp);
        assert_eq!(px, Vec2::new(300.0 + 120.0, 200.0 - 120.0));
        assert_eq!(cs.display_to_world(px, vp), world);
        assert_eq!(cs.cell_under_display(px, vp), Some(LogicalCoord::new(1, 1)));
        assert_eq!(cs.cell_under_display(Vec2::new(0.0, 0.0), vp), None);
    }

    #[test]
    fn render_scale_change_keeps_physical_mapping() {
        let mut cs = CoordinateSystem::new(5, 2.0, 60.0).unwrap();
        let before = cs.to_physical(LogicalCoord::new(-2, 1));
        cs.set_pixels_per_unit(25.0);
        cs.resize(9).unwrap();
        assert_eq!(cs.to_physical(LogicalCoord::new(-2, 1)), before);
        assert_eq!(cs.resize(0), Err(RoverError::InvalidGridSize(0)));
        assert_eq!(cs.size(), 9);
    }

    #[test]
    fn largest_grid_round_trips_at_its_corners() {
        let mut cs = CoordinateSystem::new(MAX_GRID_SIZE, 2.0, 60.0).unwrap();
        let b = cs.current_bounds();
        for corner in [LogicalCoord::new(b.min, b.max), LogicalCoord::new(b.max, b.min)] {
            assert_eq!(cs.from_physical(cs.to_physical(corner)), Ok(corner));
            assert_eq!(from_physical(to_physical(corner, 0.37), 0.37), Ok(corner));
            assert_eq!(corner.neighbors4().len(), 4);
        }
        assert_eq!(LogicalCoord::new(b.min, b.min).manhattan(LogicalCoord::new(b.max, b.max)), 2 * (MAX_GRID_SIZE - 1));

        assert_eq!(check_grid_size(MAX_GRID_SIZE + 1), Err(RoverError::InvalidGridSize(MAX_GRID_SIZE + 1)));
        assert!(CoordinateSystem::new(u32::MAX, 2.0, 60.0).is_err());
        assert!(cs.resize(MAX_GRID_SIZE + 1).is_err());
        assert_eq!(cs.size(), MAX_GRID_SIZE);
    }

    #[test]
    fn neighbours_saturate_at_the_integer_range() {
        let edge = LogicalCoord::new(i32::MAX, i32::MIN);
        let [e, _, _, s] = edge.neighbors4();
        assert_eq!(e, edge);
        assert_eq!(s, edge);
        assert_eq!(LogicalCoord::new(i32::MIN, i32::MIN).manhattan(LogicalCoord::new(i32::MAX, i32::MAX)), u32::MAX);
    }
}
