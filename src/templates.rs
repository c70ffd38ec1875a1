//! Built-in garden layouts and a seeded random garden generator.
//!
//! Layouts are stored in the legacy flat-index form (`index = row * n + col`,
//! row 0 at the top) and converted to logical coordinates on load.

use crate::grid::{path_from_indices, Cell, CellPatch, CellType, OccupancyGrid};
use log::{debug, info};
use rand::prelude::*;
use rover_common::{CoordinateSystem, LogicalCoord, Result, RoverError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplatePlant {
    pub index: usize,
    pub kind: &'static str,
    pub moisture: f32,
    pub temperature: f32,
}

const fn plant(index: usize, kind: &'static str, moisture: f32, temperature: f32) -> TemplatePlant {
    TemplatePlant { index, kind, moisture, temperature }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GardenTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub grid_size: u32,
    pub plants: &'static [TemplatePlant],
    pub obstacles: &'static [usize],
    pub default_path: &'static [usize],
}

pub const TEMPLATES: &[GardenTemplate] = &[
    GardenTemplate {
        id: "small_home",
        name: "Small Home Garden",
        description: "Perfect for residential automation testing",
        difficulty: Difficulty::Beginner,
        grid_size: 5,
        plants: &[
            plant(1, "tomato", 45.0, 24.0),
            plant(3, "lettuce", 65.0, 22.0),
            plant(5, "pepper", 35.0, 26.0),
            plant(9, "basil", 55.0, 25.0),
            plant(11, "tomato", 25.0, 27.0),
            plant(13, "cucumber", 70.0, 23.0),
            plant(15, "spinach", 40.0, 21.0),
            plant(19, "mint", 50.0, 24.0),
            plant(21, "parsley", 30.0, 22.0),
            plant(23, "kale", 60.0, 23.0),
        ],
        obstacles: &[7, 18],
        default_path: &[0, 1, 6, 11, 16, 21, 22, 23],
    },
    GardenTemplate {
        id: "commercial",
        name: "Commercial Greenhouse",
        description: "High-density commercial operation",
        difficulty: Difficulty::Advanced,
        grid_size: 5,
        plants: &[
            plant(1, "strawberry", 55.0, 23.0),
            plant(2, "strawberry", 48.0, 24.0),
            plant(3, "strawberry", 62.0, 22.0),
            plant(10, "tomato", 28.0, 28.0),
            plant(11, "tomato", 35.0, 27.0),
            plant(13, "tomato", 45.0, 26.0),
            plant(14, "tomato", 52.0, 25.0),
            plant(20, "pepper", 41.0, 25.0),
            plant(21, "pepper", 38.0, 26.0),
            plant(22, "pepper", 55.0, 24.0),
            plant(23, "pepper", 60.0, 23.0),
        ],
        obstacles: &[6, 8, 16, 18],
        default_path: &[0, 5, 10, 15, 20, 21, 22, 23, 24, 19, 14, 9, 4, 3, 2, 1],
    },
    GardenTemplate {
        id: "research",
        name: "Research Laboratory",
        description: "Precision agriculture research setup",
        difficulty: Difficulty::Expert,
        grid_size: 5,
        plants: &[
            plant(2, "experimental_A", 75.0, 20.0),
            plant(6, "experimental_B", 22.0, 30.0),
            plant(8, "experimental_C", 80.0, 18.0),
            plant(10, "drought_test", 15.0, 32.0),
            plant(14, "hydro_test", 95.0, 21.0),
            plant(16, "control_A", 50.0, 24.0),
            plant(18, "control_B", 50.0, 24.0),
            plant(22, "experimental_D", 42.0, 26.0),
        ],
        obstacles: &[7, 12, 17],
        // Crosses the central sensor column; see `blocked_waypoints`
        default_path: &[0, 1, 2, 7, 12, 17, 22, 23, 24, 19, 14, 9, 4],
    },
    GardenTemplate {
        id: "obstacle_course",
        name: "Navigation Challenge",
        description: "Test pathfinding algorithms",
        difficulty: Difficulty::Intermediate,
        grid_size: 5,
        plants: &[
            plant(2, "test_plant", 33.0, 24.0),
            plant(9, "test_plant", 58.0, 23.0),
            plant(11, "test_plant", 41.0, 25.0),
            plant(15, "test_plant", 27.0, 26.0),
            plant(22, "test_plant", 65.0, 22.0),
        ],
        obstacles: &[1, 3, 7, 10, 13, 17, 21, 23],
        default_path: &[0, 5, 6, 11, 16, 15, 20, 19, 14, 9, 4],
    },
    GardenTemplate {
        id: "vertical",
        name: "Vertical Farm Layout",
        description: "High-efficiency vertical farming",
        difficulty: Difficulty::Intermediate,
        grid_size: 5,
        plants: &[
            plant(0, "lettuce_tier1", 68.0, 21.0),
            plant(1, "lettuce_tier1", 72.0, 21.0),
            plant(3, "lettuce_tier1", 65.0, 22.0),
            plant(4, "lettuce_tier1", 70.0, 21.0),
            plant(10, "herbs_tier2", 44.0, 23.0),
            plant(11, "herbs_tier2", 48.0, 23.0),
            plant(13, "herbs_tier2", 52.0, 22.0),
            plant(14, "herbs_tier2", 46.0, 23.0),
            plant(20, "microgreens", 38.0, 20.0),
            plant(21, "microgreens", 42.0, 20.0),
            plant(23, "microgreens", 40.0, 21.0),
            plant(24, "microgreens", 36.0, 20.0),
        ],
        obstacles: &[7, 17],
        default_path: &[2, 1, 0, 5, 10, 15, 20, 21, 22, 23, 24, 19, 14, 9, 4, 3],
    },
];

pub fn all_templates() -> &'static [GardenTemplate] {
    TEMPLATES
}

pub fn template_by_id(id: &str) -> Result<&'static GardenTemplate> {
    TEMPLATES
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| RoverError::UnknownTemplate(id.to_string()))
}

impl GardenTemplate {
    /// Legacy flat cell array for this layout.
    pub fn flat_cells(&self) -> Vec<Cell> {
        let count = (self.grid_size * self.grid_size) as usize;
        let mut cells = vec![Cell::default(); count];
        for p in self.plants {
            if let Some(cell) = cells.get_mut(p.index) {
                *cell = Cell::plant(p.kind, p.moisture, p.temperature);
            }
        }
        for &index in self.obstacles {
            if let Some(cell) = cells.get_mut(index) {
                *cell = Cell::obstacle();
            }
        }
        cells
    }

    pub fn build_grid(&self) -> Result<OccupancyGrid> {
        OccupancyGrid::from_flat_cells(&self.flat_cells(), self.grid_size)
    }

    /// Default route as logical waypoints, exactly as laid out.
    pub fn default_waypoints(&self) -> Vec<LogicalCoord> {
        path_from_indices(self.default_path, CoordinateSystem::bounds(self.grid_size))
    }

    /// Default waypoints that sit on an obstacle.
    pub fn blocked_waypoints(&self) -> Vec<LogicalCoord> {
        let bounds = CoordinateSystem::bounds(self.grid_size);
        let obstacles = path_from_indices(self.obstacles, bounds);
        self.default_waypoints().into_iter().filter(|w| obstacles.contains(w)).collect()
    }
}

const RANDOM_PLANT_KINDS: &[&str] = &[
    "tomato", "lettuce", "pepper", "basil", "cucumber", "spinach", "mint", "parsley", "kale",
];

/// Seeded random garden. Each cell becomes an obstacle with probability
/// `obstacle_ratio`, else a plant with probability `plant_ratio`. The centre
/// cell is always left empty as a starting spot.
pub fn random_garden(size: u32, seed: u64, plant_ratio: f32, obstacle_ratio: f32) -> Result<OccupancyGrid> {
    let mut grid = OccupancyGrid::new(size)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let obstacle_ratio = obstacle_ratio.clamp(0.0, 1.0);
    let plant_ratio = plant_ratio.clamp(0.0, 1.0 - obstacle_ratio);

    for coord in grid.bounds().iter() {
        let roll: f32 = rng.random();
        if coord == LogicalCoord::ORIGIN {
            continue;
        }
        if roll < obstacle_ratio {
            grid.set(coord, CellPatch::of_type(CellType::Obstacle));
        } else if roll < obstacle_ratio + plant_ratio {
            let kind = RANDOM_PLANT_KINDS[rng.random_range(0..RANDOM_PLANT_KINDS.len())];
            let moisture = rng.random_range(15.0..95.0_f32).round();
            let temperature = rng.random_range(18.0..32.0_f32).round();
            grid.set(coord, CellPatch::plant(kind, moisture, temperature));
        }
    }

    info!(
        "Random garden {}x{} (seed {}): {} plants, {} obstacles.",
        size,
        size,
        seed,
        grid.plant_count(),
        grid.cells_of_type(CellType::Obstacle).len()
    );
    debug!("Random garden ratios: plants {:.2}, obstacles {:.2}", plant_ratio, obstacle_ratio);
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_builds() {
        for t in all_templates() {
            let grid = t.build_grid().unwrap();
            assert_eq!(grid.plant_count(), t.plants.len(), "{}", t.id);
            assert_eq!(grid.cells_of_type(CellType::Obstacle).len(), t.obstacles.len(), "{}", t.id);
            assert_eq!(t.default_waypoints().len(), t.default_path.len(), "{}", t.id);
        }
    }

    #[test]
    fn small_home_layout() {
        let t = template_by_id("small_home").unwrap();
        let grid = t.build_grid().unwrap();
        // index 1 -> row 0, col 1 -> (-1, 2)
        let tomato = grid.get(LogicalCoord::new(-1, 2));
        assert_eq!(tomato.plant_kind.as_deref(), Some("tomato"));
        assert_eq!(tomato.moisture, Some(45.0));
        // index 7 -> row 1, col 2 -> (0, 1)
        assert!(grid.get(LogicalCoord::new(0, 1)).is_obstacle());
        assert_eq!(t.default_waypoints()[0], LogicalCoord::new(-2, 2));
        assert!(t.blocked_waypoints().is_empty());
    }

    #[test]
    fn research_route_crosses_obstacles() {
        let t = template_by_id("research").unwrap();
        assert_eq!(
            t.blocked_waypoints(),
            vec![LogicalCoord::new(0, 1), LogicalCoord::new(0, 0), LogicalCoord::new(0, -1)]
        );
    }

    #[test]
    fn catalogue_names_and_difficulty() {
        let listed: Vec<_> = all_templates().iter().map(|t| (t.id, t.name, t.difficulty)).collect();
        assert_eq!(
            listed,
            vec![
                ("small_home", "Small Home Garden", Difficulty::Beginner),
                ("commercial", "Commercial Greenhouse", Difficulty::Advanced),
                ("research", "Research Laboratory", Difficulty::Expert),
                ("obstacle_course", "Navigation Challenge", Difficulty::Intermediate),
                ("vertical", "Vertical Farm Layout", Difficulty::Intermediate),
            ]
        );
        assert_eq!(template_by_id("research").unwrap().description, "Precision agriculture research setup");
    }

    #[test]
    fn unknown_template() {
        assert_eq!(template_by_id("moon_base"), Err(RoverError::UnknownTemplate("moon_base".into())));
    }

    #[test]
    fn random_garden_is_seeded() {
        let a = random_garden(9, 42, 0.3, 0.1).unwrap();
        let b = random_garden(9, 42, 0.3, 0.1).unwrap();
        assert_eq!(a, b);
        assert!(a.get(LogicalCoord::ORIGIN).is_default());
        let empty = random_garden(9, 42, 0.0, 0.0).unwrap();
        assert!(empty.is_empty());
        assert!(random_garden(0, 1, 0.3, 0.1).is_err());
    }
}
