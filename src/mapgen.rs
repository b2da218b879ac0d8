//! Procedural map generation.
//!
//! Resources are seeded with a flood that grows from sparse starting cells:
//! every candidate cell draws a number and must beat a threshold that gets
//! looser the more matching neighbours it already has. Lakes are then
//! smoothed, a town hall site is picked and the opening area is topped up so
//! a new settlement always has wood and stone to work with.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    catalog::{BuildingKind, Catalog, ResourceCategory, ResourceKind},
    config::{GameConfig, MapGenConfig, SeedThresholds},
    grid::{Grid, Terrain, TileMetrics, TileObject, TilePos},
    rng::{RngManager, MAPGEN_STREAM},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationCellError {
    #[error("cell {0} is outside the grid")]
    OutOfBounds(TilePos),
}

/// Remaining generation steps, shared with whoever displays progress.
#[derive(Debug, Clone, Default)]
pub struct LoadProgress {
    remaining: Arc<AtomicUsize>,
}

impl LoadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    fn start(&self, total: usize) {
        self.remaining.store(total, Ordering::SeqCst);
    }

    fn complete_step(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedMap {
    pub grid: Grid,
    pub town_hall: TilePos,
    pub town_hall_index: usize,
}

pub struct MapGenerator<'a> {
    catalog: &'a Catalog,
    config: &'a MapGenConfig,
    bounds: i32,
    metrics: TileMetrics,
    stub_roads: bool,
    progress: LoadProgress,
}

impl<'a> MapGenerator<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a GameConfig) -> Self {
        Self {
            catalog,
            config: &config.mapgen,
            bounds: config.bounds(),
            metrics: config.metrics(),
            stub_roads: config.stub_roads(),
            progress: LoadProgress::new(),
        }
    }

    pub fn with_progress(mut self, progress: LoadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Generates from a seed, drawing from the same stream a session seeded
    /// with `seed` would use.
    pub fn generate(&self, seed: u64) -> GeneratedMap {
        let mut rngs = RngManager::new(seed);
        let mut rng = rngs.stream(MAPGEN_STREAM);
        self.generate_with(&mut rng)
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> GeneratedMap {
        let plan = self.seeding_plan();
        // seeding stages + cleanup + town hall + opening guarantee
        self.progress.start(plan.len() + 3);

        let mut grid = Grid::new(self.bounds, self.metrics);

        for (kind, thresholds) in plan {
            let mut seeded = 0;
            let positions: Vec<TilePos> = grid.positions().collect();
            for pos in positions {
                match spawn_resource(&mut grid, self.catalog, kind, &thresholds, pos, rng) {
                    Ok(count) => seeded += count,
                    Err(err) => warn!(error = %err, resource = kind.name(), "mapgen.cell_skipped"),
                }
            }
            debug!(resource = kind.name(), seeded, "mapgen.seeded");
            self.progress.complete_step();
        }

        let shores = cleanup_shores(&mut grid, self.catalog);
        debug!(shores, "mapgen.cleanup");
        self.progress.complete_step();

        let town_hall = self.place_town_hall(&mut grid, rng);
        if self.stub_roads {
            self.place_stub_roads(&mut grid, town_hall);
        }
        self.progress.complete_step();

        self.guarantee_opening(&mut grid, town_hall, rng);
        self.progress.complete_step();

        let town_hall_index = grid.index(town_hall).unwrap_or_default();
        info!(
            bounds = self.bounds,
            town_hall_x = town_hall.x,
            town_hall_y = town_hall.y,
            "mapgen.complete"
        );
        GeneratedMap {
            grid,
            town_hall,
            town_hall_index,
        }
    }

    /// Water first so lakes settle before anything else reads terrain.
    fn seeding_plan(&self) -> Vec<(ResourceKind, SeedThresholds)> {
        vec![
            (ResourceKind::Water, self.config.water),
            (ResourceKind::Tree, self.config.trees),
            (ResourceKind::Stone, self.config.stone),
            (ResourceKind::Coal, self.config.coal),
            (ResourceKind::Iron, self.config.iron),
        ]
    }

    fn is_candidate(&self, grid: &Grid, pos: TilePos) -> bool {
        let Some(tile) = grid.get(pos) else {
            return false;
        };
        if !tile.is_open_grass() {
            return false;
        }
        let open = grid.neighbors8(pos).filter(|t| t.is_open_grass()).count();
        open > self.config.min_grass_neighbors
    }

    /// Raster scan over the inset area; each qualifying cell is accepted only
    /// if it wins two independent draws.
    fn place_town_hall<R: Rng + ?Sized>(&self, grid: &mut Grid, rng: &mut R) -> TilePos {
        let inset = self.config.start_inset.max(1);
        let candidates: Vec<TilePos> = grid
            .positions()
            .filter(|p| {
                p.x >= inset
                    && p.y >= inset
                    && p.x < self.bounds - inset
                    && p.y < self.bounds - inset
            })
            .filter(|p| self.is_candidate(grid, *p))
            .collect();

        let first = probability(self.config.town_hall_first_chance);
        let second = probability(self.config.town_hall_second_chance);
        let mut chosen = None;
        'passes: for _ in 0..self.config.town_hall_scan_passes.max(1) {
            for pos in &candidates {
                if rng.gen_bool(first) && rng.gen_bool(second) {
                    chosen = Some(*pos);
                    break 'passes;
                }
            }
        }

        let pos = match chosen.or_else(|| candidates.first().copied()) {
            Some(pos) => pos,
            None => {
                let center = TilePos::new(self.bounds / 2, self.bounds / 2);
                warn!(
                    x = center.x,
                    y = center.y,
                    "mapgen.no_town_hall_candidate"
                );
                if let Some(tile) = grid.get_mut(center) {
                    tile.terrain = Terrain::Grass;
                }
                center
            }
        };

        let preset = self.catalog.preset(BuildingKind::TownHall);
        let texture = preset.texture_pool.first().copied().unwrap_or_default();
        let id = grid.allocate_object_id();
        grid.set_object(pos, TileObject::from_preset(id, preset, texture));
        grid.reveal(pos, preset.range);
        pos
    }

    /// Mobile maps get a few road tiles next to the hall so the first
    /// road-bound building can be placed.
    fn place_stub_roads(&self, grid: &mut Grid, town_hall: TilePos) {
        let directions = [(0, 1), (1, 0), (0, -1), (-1, 0)];
        let buildable = |grid: &Grid, pos: TilePos| {
            grid.get(pos)
                .is_some_and(|t| !t.is_water() && t.object.building().is_none())
        };
        let Some((dx, dy)) = directions
            .into_iter()
            .find(|(dx, dy)| buildable(grid, town_hall.offset(*dx, *dy)))
        else {
            warn!("mapgen.stub_roads_blocked");
            return;
        };

        let preset = self.catalog.preset(BuildingKind::Road);
        for step in 1..=self.config.stub_road_length.max(0) {
            let pos = town_hall.offset(dx * step, dy * step);
            if !buildable(grid, pos) {
                break;
            }
            let id = grid.allocate_object_id();
            grid.set_object(pos, TileObject::from_preset(id, preset, 0));
            if let Some(tile) = grid.get_mut(pos) {
                tile.terrain = Terrain::Grass;
            }
            grid.refresh_road_textures(pos);
        }
    }

    fn guarantee_opening<R: Rng + ?Sized>(&self, grid: &mut Grid, town_hall: TilePos, rng: &mut R) {
        let range = self.catalog.preset(BuildingKind::TownHall).range;
        let in_category = |category: ResourceCategory| {
            move |tile: &crate::grid::Tile| {
                tile.object
                    .resource_kind()
                    .is_some_and(|r| r.category() == category)
            }
        };

        let mut trees = grid.count_within(town_hall, range, in_category(ResourceCategory::Tree));
        let mut open = open_cells(grid, town_hall, range);
        while trees < self.config.min_starting_trees && !open.is_empty() {
            let pos = open.swap_remove(rng.gen_range(0..open.len()));
            match place_resource(grid, self.catalog, pos, ResourceKind::Tree, rng) {
                Ok(()) => trees += 1,
                Err(err) => warn!(error = %err, "mapgen.cell_skipped"),
            }
        }

        let ore = grid.count_within(town_hall, range, in_category(ResourceCategory::Ore));
        if ore == 0 {
            let mut open = open_cells(grid, town_hall, range);
            let mut placed = 0;
            while placed < self.config.starting_stone && !open.is_empty() {
                let pos = open.swap_remove(rng.gen_range(0..open.len()));
                match place_resource(grid, self.catalog, pos, ResourceKind::Stone, rng) {
                    Ok(()) => placed += 1,
                    Err(err) => warn!(error = %err, "mapgen.cell_skipped"),
                }
            }
        }
    }
}

fn open_cells(grid: &Grid, center: TilePos, range: i32) -> Vec<TilePos> {
    grid.within_range(center, range)
        .into_iter()
        .filter(|p| grid.get(*p).is_some_and(|t| t.is_open_grass()))
        .collect()
}

/// Neighbours that count towards the seeding threshold of `kind`.
pub fn matching_neighbors(grid: &Grid, pos: TilePos, kind: ResourceKind) -> usize {
    grid.neighbors4(pos)
        .filter(|tile| match kind.category() {
            ResourceCategory::Water => tile.is_water(),
            ResourceCategory::Tree | ResourceCategory::Ore => tile
                .object
                .resource_kind()
                .is_some_and(|r| r.category() == kind.category()),
            ResourceCategory::Farmland => tile.object.object_id() == kind.object_id(),
        })
        .count()
}

/// Writes a resource onto a tile. Water also changes the terrain and ore
/// sits on stone ground.
pub fn place_resource<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    pos: TilePos,
    kind: ResourceKind,
    rng: &mut R,
) -> Result<(), GenerationCellError> {
    if !grid.contains(pos) {
        return Err(GenerationCellError::OutOfBounds(pos));
    }
    let pool = kind.texture_pool();
    let texture = if pool.is_empty() {
        0
    } else {
        pool[rng.gen_range(0..pool.len())]
    };
    let id = grid.allocate_object_id();
    grid.set_object(pos, TileObject::resource(id, kind, texture, catalog));
    let tile = grid
        .get_mut(pos)
        .ok_or(GenerationCellError::OutOfBounds(pos))?;
    tile.terrain = match kind.category() {
        ResourceCategory::Water => Terrain::Water,
        ResourceCategory::Ore => Terrain::Stone,
        _ => tile.terrain,
    };
    Ok(())
}

/// Flood-seeds `kind` from `start`. Returns the number of cells converted.
///
/// A cell is skipped if it is water or already occupied. Each visited cell
/// draws once per flood; on success its four neighbours are queued.
pub fn spawn_resource<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    kind: ResourceKind,
    thresholds: &SeedThresholds,
    start: TilePos,
    rng: &mut R,
) -> Result<usize, GenerationCellError> {
    if !grid.contains(start) {
        return Err(GenerationCellError::OutOfBounds(start));
    }
    let mut visited = vec![false; grid.len()];
    let mut stack = vec![start];
    let mut seeded = 0;

    while let Some(pos) = stack.pop() {
        let Some(index) = grid.index(pos) else {
            continue;
        };
        if visited[index] {
            continue;
        }
        visited[index] = true;

        let Some(tile) = grid.get(pos) else {
            continue;
        };
        if tile.is_water() || !tile.object.is_empty() {
            continue;
        }

        let roll = rng.gen_range(0..thresholds.max.max(1));
        let neighbors = matching_neighbors(grid, pos, kind);
        if roll <= thresholds.threshold_for(neighbors) {
            continue;
        }

        place_resource(grid, catalog, pos, kind, rng)?;
        seeded += 1;
        // reversed so the left neighbour is explored first
        for next in pos.neighbors4().into_iter().rev() {
            if grid.contains(next) {
                stack.push(next);
            }
        }
    }
    Ok(seeded)
}

/// Fills open grass cells that touch at least two water cells so lakes have
/// no one-cell notches.
pub fn cleanup_shores(grid: &mut Grid, catalog: &Catalog) -> usize {
    let mut converted = 0;
    let positions: Vec<TilePos> = grid.positions().collect();
    for pos in positions {
        let Some(tile) = grid.get(pos) else {
            continue;
        };
        if tile.terrain != Terrain::Grass || !tile.object.is_empty() {
            continue;
        }
        let water = grid.neighbors4(pos).filter(|t| t.is_water()).count();
        if water < 2 {
            continue;
        }
        let id = grid.allocate_object_id();
        let texture = ResourceKind::Shore.texture_pool()[0];
        grid.set_object(pos, TileObject::resource(id, ResourceKind::Shore, texture, catalog));
        if let Some(tile) = grid.get_mut(pos) {
            tile.terrain = Terrain::Water;
        }
        converted += 1;
    }
    converted
}

/// Clamps into `[0, 1]`; NaN counts as never.
fn probability(chance: f64) -> f64 {
    if chance.is_nan() {
        0.0
    } else {
        chance.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn blank(bounds: i32) -> Grid {
        Grid::new(bounds, TileMetrics::default())
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Mobile);
        let generator = MapGenerator::new(&catalog, &config);
        let a = generator.generate(11);
        let b = generator.generate(11);
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.town_hall, b.town_hall);
        assert_eq!(a.town_hall_index, b.town_hall_index);
    }

    #[test]
    fn exactly_one_town_hall_away_from_the_edge() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Desktop);
        for seed in [1, 2, 3] {
            let map = MapGenerator::new(&catalog, &config).generate(seed);
            assert_eq!(map.grid.count_buildings(BuildingKind::TownHall), 1);
            let hall = map.town_hall;
            assert!(hall.x > 0 && hall.y > 0);
            assert!(hall.x < map.grid.bounds() - 1 && hall.y < map.grid.bounds() - 1);
            assert_eq!(map.grid.pos_of(map.town_hall_index), Some(hall));
            assert!(map.grid.get(hall).unwrap().is_visible);
        }
    }

    #[test]
    fn nan_odds_fall_back_to_the_first_candidate() {
        let catalog = Catalog::standard();
        let mut config = GameConfig::for_profile(Profile::Mobile);
        config.mapgen.town_hall_first_chance = f64::NAN;
        let map = MapGenerator::new(&catalog, &config).generate(9);
        assert_eq!(map.grid.count_buildings(BuildingKind::TownHall), 1);
        assert_eq!(probability(f64::NAN), 0.0);
        assert_eq!(probability(2.0), 1.0);
    }

    #[test]
    fn opening_has_trees_and_stone() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Desktop);
        let range = catalog.preset(BuildingKind::TownHall).range;
        for seed in [4, 5, 6, 7] {
            let map = MapGenerator::new(&catalog, &config).generate(seed);
            let trees = map.grid.count_within(map.town_hall, range, |t| {
                t.object.resource_kind() == Some(ResourceKind::Tree)
            });
            let ore = map.grid.count_within(map.town_hall, range, |t| {
                t.object
                    .resource_kind()
                    .is_some_and(|r| r.category() == ResourceCategory::Ore)
            });
            assert!(trees >= 4, "seed {seed}: {trees} trees");
            assert!(ore >= 1, "seed {seed}: no ore");
        }
    }

    #[test]
    fn mobile_maps_get_stub_roads() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Mobile);
        let map = MapGenerator::new(&catalog, &config).generate(9);
        assert!(map.grid.count_buildings(BuildingKind::Road) >= 1);
        assert!(map.grid.has_adjacent_road(map.town_hall));

        let desktop = GameConfig::for_profile(Profile::Desktop);
        let map = MapGenerator::new(&catalog, &desktop).generate(9);
        assert_eq!(map.grid.count_buildings(BuildingKind::Road), 0);
    }

    #[test]
    fn generated_grid_keeps_single_occupancy() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Desktop);
        let map = MapGenerator::new(&catalog, &config).generate(21);
        assert!(map.grid.occupancy_consistent());
        assert_eq!(map.grid.len(), 75 * 75);
    }

    #[test]
    fn progress_reaches_zero() {
        let catalog = Catalog::standard();
        let config = GameConfig::for_profile(Profile::Mobile);
        let progress = LoadProgress::new();
        MapGenerator::new(&catalog, &config)
            .with_progress(progress.clone())
            .generate(3);
        assert_eq!(progress.remaining(), 0);
    }

    #[test]
    fn unbeatable_thresholds_seed_nothing() {
        let catalog = Catalog::standard();
        let mut grid = blank(6);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let never = SeedThresholds::new(10, 9, 9, 9, 9);
        let seeded = spawn_resource(
            &mut grid,
            &catalog,
            ResourceKind::Tree,
            &never,
            TilePos::new(2, 2),
            &mut rng,
        )
        .unwrap();
        assert_eq!(seeded, 0);
        assert!(grid.tiles().all(|t| t.object.is_empty()));
    }

    #[test]
    fn seeding_skips_water_and_occupied_cells() {
        let catalog = Catalog::standard();
        let mut grid = blank(3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for pos in grid.positions().collect::<Vec<_>>() {
            place_resource(&mut grid, &catalog, pos, ResourceKind::Water, &mut rng).unwrap();
        }
        let always = SeedThresholds::new(1_000, 0, 0, 0, 0);
        let seeded = spawn_resource(
            &mut grid,
            &catalog,
            ResourceKind::Tree,
            &always,
            TilePos::new(1, 1),
            &mut rng,
        )
        .unwrap();
        assert_eq!(seeded, 0);
        assert!(spawn_resource(
            &mut grid,
            &catalog,
            ResourceKind::Tree,
            &always,
            TilePos::new(5, 5),
            &mut rng,
        )
        .is_err());
    }

    #[test]
    fn ore_neighbours_count_across_kinds() {
        let catalog = Catalog::standard();
        let mut grid = blank(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let center = TilePos::new(2, 2);
        place_resource(&mut grid, &catalog, TilePos::new(1, 2), ResourceKind::Stone, &mut rng)
            .unwrap();
        place_resource(&mut grid, &catalog, TilePos::new(3, 2), ResourceKind::Iron, &mut rng)
            .unwrap();
        place_resource(&mut grid, &catalog, TilePos::new(2, 1), ResourceKind::Tree, &mut rng)
            .unwrap();
        assert_eq!(matching_neighbors(&grid, center, ResourceKind::Coal), 2);
        assert_eq!(matching_neighbors(&grid, center, ResourceKind::Tree), 1);
        assert_eq!(matching_neighbors(&grid, center, ResourceKind::Water), 0);
    }

    #[test]
    fn cleanup_fills_notches_between_water() {
        let catalog = Catalog::standard();
        let mut grid = blank(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        place_resource(&mut grid, &catalog, TilePos::new(1, 2), ResourceKind::Water, &mut rng)
            .unwrap();
        place_resource(&mut grid, &catalog, TilePos::new(3, 2), ResourceKind::Water, &mut rng)
            .unwrap();
        let converted = cleanup_shores(&mut grid, &catalog);
        let notch = grid.get(TilePos::new(2, 2)).unwrap();
        assert!(converted >= 1);
        assert_eq!(notch.terrain, Terrain::Water);
        assert_eq!(notch.object.resource_kind(), Some(ResourceKind::Shore));
        assert_eq!(grid.get(TilePos::new(0, 0)).unwrap().terrain, Terrain::Grass);
    }
}
