//! Sparse occupancy grid keyed by logical coordinate.
//!
//! Absent keys read as an empty cell. Every stored key lies inside the
//! current bounds: out-of-bounds writes are dropped with a warning and a
//! shrink prunes whatever falls outside.

use log::{debug, info, warn};
use rover_common::{check_grid_size, CoordinateSystem, GridBounds, LogicalCoord, Result, RoverError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Empty,
    Obstacle,
    Plant,
}

/// Static per-coordinate world data plus the explored flag set by the rover.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "type", default)]
    pub cell_type: CellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moisture: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_kind: Option<String>,
    #[serde(default)]
    pub explored: bool,
}

impl Cell {
    pub fn obstacle() -> Self {
        Cell { cell_type: CellType::Obstacle, ..Default::default() }
    }

    pub fn plant(kind: &str, moisture: f32, temperature: f32) -> Self {
        Cell {
            cell_type: CellType::Plant,
            moisture: Some(moisture),
            temperature: Some(temperature),
            plant_kind: Some(kind.to_string()),
            explored: false,
        }
    }

    pub fn is_obstacle(&self) -> bool {
        self.cell_type == CellType::Obstacle
    }

    pub fn is_plant(&self) -> bool {
        self.cell_type == CellType::Plant
    }

    /// True when the cell carries nothing beyond the default.
    pub fn is_default(&self) -> bool {
        *self == Cell::default()
    }

    /// Merges the fields present in `patch`; absent fields keep their value.
    pub fn apply(&mut self, patch: &CellPatch) {
        if let Some(t) = patch.cell_type {
            self.cell_type = t;
        }
        if let Some(m) = patch.moisture {
            self.moisture = Some(m);
        }
        if let Some(t) = patch.temperature {
            self.temperature = Some(t);
        }
        if let Some(kind) = &patch.plant_kind {
            self.plant_kind = Some(kind.clone());
        }
        if let Some(e) = patch.explored {
            self.explored = e;
        }
    }
}

/// Partial cell update, as issued by an editor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellPatch {
    pub cell_type: Option<CellType>,
    pub moisture: Option<f32>,
    pub temperature: Option<f32>,
    pub plant_kind: Option<String>,
    pub explored: Option<bool>,
}

impl CellPatch {
    pub fn of_type(cell_type: CellType) -> Self {
        CellPatch { cell_type: Some(cell_type), ..Default::default() }
    }

    pub fn plant(kind: &str, moisture: f32, temperature: f32) -> Self {
        CellPatch {
            cell_type: Some(CellType::Plant),
            moisture: Some(moisture),
            temperature: Some(temperature),
            plant_kind: Some(kind.to_string()),
            explored: None,
        }
    }
}

impl From<&Cell> for CellPatch {
    fn from(cell: &Cell) -> Self {
        CellPatch {
            cell_type: Some(cell.cell_type),
            moisture: cell.moisture,
            temperature: cell.temperature,
            plant_kind: cell.plant_kind.clone(),
            explored: Some(cell.explored),
        }
    }
}

/// One stored entry of a [`GridExport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCell {
    pub x: i64,
    pub y: i64,
    #[serde(flatten)]
    pub cell: Cell,
}

/// Lossless persistence form of a grid: its size and the sparse cell map,
/// listed in enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridExport {
    pub grid_size: u32,
    pub cells: Vec<StoredCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    bounds: GridBounds,
    cells: HashMap<LogicalCoord, Cell>,
}

impl OccupancyGrid {
    pub fn new(size: u32) -> Result<Self> {
        check_grid_size(size)?;
        Ok(OccupancyGrid {
            bounds: CoordinateSystem::bounds(size),
            cells: HashMap::new(),
        })
    }

    pub fn size(&self) -> u32 {
        self.bounds.size
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn contains(&self, coord: LogicalCoord) -> bool {
        self.bounds.contains(coord)
    }

    /// Cell at `coord`; empty when nothing is stored or the coordinate is out of bounds.
    pub fn get(&self, coord: LogicalCoord) -> Cell {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// Stored entry only, without defaulting.
    pub fn stored(&self, coord: LogicalCoord) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    /// Merges `patch` into the cell. Returns false (and stores nothing) when
    /// `coord` is outside the current bounds.
    pub fn set(&mut self, coord: LogicalCoord, patch: CellPatch) -> bool {
        if !self.bounds.contains(coord) {
            warn!(
                "Coordinate {} is out of bounds for grid size {}; edit ignored.",
                coord, self.bounds.size
            );
            return false;
        }
        self.cells.entry(coord).or_default().apply(&patch);
        true
    }

    pub fn remove(&mut self, coord: LogicalCoord) -> Option<Cell> {
        self.cells.remove(&coord)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Changes the grid size. Existing entries keep their coordinates;
    /// entries outside the new bounds are dropped. Returns how many were pruned.
    pub fn resize(&mut self, size: u32) -> Result<usize> {
        check_grid_size(size)?;
        let old_size = self.bounds.size;
        self.bounds = CoordinateSystem::bounds(size);

        let bounds = self.bounds;
        let before = self.cells.len();
        self.cells.retain(|coord, _| bounds.contains(*coord));
        let pruned = before - self.cells.len();

        info!(
            "Grid resized {}x{} -> {}x{} (range {}..={}), {} cells pruned.",
            old_size, old_size, size, size, bounds.min, bounds.max, pruned
        );
        Ok(pruned)
    }

    /// Every in-bounds coordinate with its cell (empties included), rows from
    /// max y to min y, each row from min x to max x.
    pub fn enumerate(&self) -> Vec<(LogicalCoord, Cell)> {
        self.bounds.iter().map(|c| (c, self.get(c))).collect()
    }

    /// Number of stored (non-default) entries.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Coordinates of every cell of `cell_type`, in enumeration order.
    pub fn cells_of_type(&self, cell_type: CellType) -> Vec<LogicalCoord> {
        self.bounds
            .iter()
            .filter(|c| self.get(*c).cell_type == cell_type)
            .collect()
    }

    pub fn plant_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_plant()).count()
    }

    pub fn explored_plant_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_plant() && c.explored).count()
    }

    /// Passable for planning: in bounds and not an obstacle.
    pub fn is_traversable(&self, coord: LogicalCoord) -> bool {
        self.bounds.contains(coord) && !self.get(coord).is_obstacle()
    }

    /// Flags a visited cell. Out-of-bounds coordinates are ignored.
    pub fn mark_explored(&mut self, coord: LogicalCoord) -> bool {
        if !self.bounds.contains(coord) {
            debug!("Not marking {} explored: outside grid bounds.", coord);
            return false;
        }
        self.cells.entry(coord).or_default().explored = true;
        true
    }

    /// Builds a grid from a legacy flat cell array (`index = row * n + col`).
    /// Default cells are not stored; entries past `size * size` are ignored.
    pub fn from_flat_cells(cells: &[Cell], size: u32) -> Result<Self> {
        let mut grid = OccupancyGrid::new(size)?;
        if cells.len() > grid.bounds.cell_count() {
            warn!(
                "Flat grid has {} cells but size {} holds {}; extra cells ignored.",
                cells.len(), size, grid.bounds.cell_count()
            );
        }
        for (index, cell) in cells.iter().enumerate() {
            if cell.is_default() {
                continue;
            }
            if let Some(coord) = grid.bounds.coord_at(index) {
                grid.cells.insert(coord, cell.clone());
            }
        }
        Ok(grid)
    }

    /// Legacy flat cell array, one entry per in-bounds coordinate.
    pub fn to_flat_cells(&self) -> Vec<Cell> {
        self.enumerate().into_iter().map(|(_, cell)| cell).collect()
    }

    pub fn export(&self) -> GridExport {
        let cells = self
            .bounds
            .iter()
            .filter_map(|c| {
                self.cells.get(&c).map(|cell| StoredCell {
                    x: c.x as i64,
                    y: c.y as i64,
                    cell: cell.clone(),
                })
            })
            .collect();
        GridExport { grid_size: self.bounds.size, cells }
    }

    /// Rebuilds a grid from an export. Entries outside the exported bounds are
    /// dropped with a warning; a coordinate that does not fit an `i32` is rejected.
    pub fn import(data: GridExport) -> Result<Self> {
        let mut grid = OccupancyGrid::new(data.grid_size)?;
        let mut dropped = 0usize;
        for entry in data.cells {
            let coord = match (i32::try_from(entry.x), i32::try_from(entry.y)) {
                (Ok(x), Ok(y)) => LogicalCoord::new(x, y),
                _ => {
                    return Err(RoverError::InvalidCoordinate {
                        x: entry.x as f64,
                        y: entry.y as f64,
                    })
                }
            };
            if !grid.bounds.contains(coord) {
                dropped += 1;
                continue;
            }
            grid.cells.insert(coord, entry.cell);
        }
        if dropped > 0 {
            warn!("Dropped {} imported cells outside grid size {}.", dropped, data.grid_size);
        }
        Ok(grid)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export()).map_err(|e| RoverError::Persistence(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let data: GridExport =
            serde_json::from_str(text).map_err(|e| RoverError::Persistence(e.to_string()))?;
        Self::import(data)
    }
}

/// Converts a legacy flat-index path into logical waypoints, keeping order.
/// Indices outside the grid are skipped with a warning.
pub fn path_from_indices(indices: &[usize], bounds: GridBounds) -> Vec<LogicalCoord> {
    indices
        .iter()
        .filter_map(|&index| {
            let coord = bounds.coord_at(index);
            if coord.is_none() {
                warn!("Path index {} is outside a {}x{} grid; skipped.", index, bounds.size, bounds.size);
            }
            coord
        })
        .collect()
}

/// Inverse of [`path_from_indices`] for in-bounds waypoints.
pub fn path_to_indices(path: &[LogicalCoord], bounds: GridBounds) -> Vec<usize> {
    path.iter().filter_map(|c| bounds.index_of(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: i32, y: i32) -> LogicalCoord {
        LogicalCoord::new(x, y)
    }

    #[test]
    fn absent_cells_read_as_empty() {
        let grid = OccupancyGrid::new(5).unwrap();
        assert_eq!(grid.get(c(0, 0)), Cell::default());
        assert_eq!(grid.get(c(40, 40)).cell_type, CellType::Empty);
        assert!(grid.is_empty());
    }

    #[test]
    fn set_merges_fields() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        assert!(grid.set(c(1, -1), CellPatch::plant("basil", 55.0, 25.0)));
        assert!(grid.set(c(1, -1), CellPatch { moisture: Some(60.0), ..Default::default() }));
        let cell = grid.get(c(1, -1));
        assert_eq!(cell.cell_type, CellType::Plant);
        assert_eq!(cell.moisture, Some(60.0));
        assert_eq!(cell.temperature, Some(25.0));
        assert_eq!(cell.plant_kind.as_deref(), Some("basil"));
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        assert!(!grid.set(c(3, 0), CellPatch::of_type(CellType::Obstacle)));
        assert!(grid.is_empty());
        assert!(!grid.mark_explored(c(0, -3)));
    }

    #[test]
    fn remove_restores_default() {
        let mut grid = OccupancyGrid::new(3).unwrap();
        grid.set(c(0, 0), CellPatch::of_type(CellType::Obstacle));
        assert!(grid.remove(c(0, 0)).is_some());
        assert_eq!(grid.get(c(0, 0)), Cell::default());
    }

    #[test]
    fn shrink_prunes_and_grow_keeps() {
        let mut grid = OccupancyGrid::new(7).unwrap();
        grid.set(c(3, 3), CellPatch::of_type(CellType::Obstacle));
        grid.set(c(-1, 1), CellPatch::plant("kale", 60.0, 23.0));
        assert_eq!(grid.resize(5).unwrap(), 1);
        assert_eq!(grid.get(c(3, 3)), Cell::default());
        assert_eq!(grid.resize(9).unwrap(), 0);
        assert_eq!(grid.get(c(-1, 1)).plant_kind.as_deref(), Some("kale"));
        assert_eq!(grid.resize(0), Err(RoverError::InvalidGridSize(0)));
    }

    #[test]
    fn enumerate_is_row_major_from_top() {
        let grid = OccupancyGrid::new(3).unwrap();
        let coords: Vec<_> = grid.enumerate().into_iter().map(|(c, _)| c).collect();
        assert_eq!(coords.first(), Some(&c(-1, 1)));
        assert_eq!(coords[1], c(0, 1));
        assert_eq!(coords[3], c(-1, 0));
        assert_eq!(coords.last(), Some(&c(1, -1)));
        assert_eq!(coords.len(), 9);

        let even = OccupancyGrid::new(4).unwrap();
        let first = even.enumerate()[0].0;
        assert_eq!(first, c(-2, 1));
    }

    #[test]
    fn flat_cells_round_trip() {
        let mut flat = vec![Cell::default(); 25];
        flat[7] = Cell::obstacle();
        flat[13] = Cell::plant("cucumber", 70.0, 23.0);
        let grid = OccupancyGrid::from_flat_cells(&flat, 5).unwrap();
        assert_eq!(grid.len(), 2);
        assert!(grid.get(c(0, 1)).is_obstacle());
        assert!(grid.get(c(1, 0)).is_plant());
        assert_eq!(grid.to_flat_cells(), flat);
    }

    #[test]
    fn flat_path_conversion() {
        let bounds = GridBounds::for_size(5);
        let path = path_from_indices(&[0, 1, 6, 99], bounds);
        assert_eq!(path, vec![c(-2, 2), c(-1, 2), c(-1, 1)]);
        assert_eq!(path_to_indices(&path, bounds), vec![0, 1, 6]);
    }

    #[test]
    fn export_import_is_lossless() {
        let mut grid = OccupancyGrid::new(6).unwrap();
        grid.set(c(-3, 2), CellPatch::of_type(CellType::Obstacle));
        grid.set(c(2, -3), CellPatch::plant("mint", 50.0, 24.0));
        grid.mark_explored(c(0, 0));
        let json = grid.to_json().unwrap();
        let restored = OccupancyGrid::from_json(&json).unwrap();
        assert_eq!(restored, grid);
        assert_eq!(restored.size(), 6);
    }

    #[test]
    fn import_drops_out_of_bounds_and_rejects_bad_payloads() {
        let data = GridExport {
            grid_size: 3,
            cells: vec![
                StoredCell { x: 0, y: 0, cell: Cell::obstacle() },
                StoredCell { x: 5, y: 0, cell: Cell::obstacle() },
            ],
        };
        let grid = OccupancyGrid::import(data).unwrap();
        assert_eq!(grid.len(), 1);

        let huge = GridExport {
            grid_size: 3,
            cells: vec![StoredCell { x: i64::MAX, y: 0, cell: Cell::obstacle() }],
        };
        assert!(matches!(OccupancyGrid::import(huge), Err(RoverError::InvalidCoordinate { .. })));
        assert!(matches!(OccupancyGrid::from_json("{"), Err(RoverError::Persistence(_))));
        assert!(matches!(
            OccupancyGrid::from_json(r#"{"grid_size":0,"cells":[]}"#),
            Err(RoverError::InvalidGridSize(0))
        ));
    }

    #[test]
    fn plant_counters() {
        let mut grid = OccupancyGrid::new(5).unwrap();
        grid.set(c(0, 0), CellPatch::plant("tomato", 45.0, 24.0));
        grid.set(c(1, 0), CellPatch::plant("lettuce", 65.0, 22.0));
        grid.mark_explored(c(1, 0));
        assert_eq!(grid.plant_count(), 2);
        assert_eq!(grid.explored_plant_count(), 1);
        assert_eq!(grid.cells_of_type(CellType::Plant), vec![c(0, 0), c(1, 0)]);
    }
}
