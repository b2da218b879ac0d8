//! One running game: the world plus everything that acts on it.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    catalog::{BuildingKind, Catalog},
    config::GameConfig,
    engine::{DaySummary, Engine, EngineBuilder, EngineSettings},
    grid::TilePos,
    interaction::Command,
    mapgen::{LoadProgress, MapGenerator},
    placement::{self, DeletionError, Placement, PlacementError, Removal},
    rng::PLACEMENT_STREAM,
    snapshot::{self, GameStateData, PersistenceError, SaveStore},
    world::{Inventory, World},
};

pub struct Session {
    config: GameConfig,
    catalog: Arc<Catalog>,
    store: SaveStore,
    engine: Engine,
    world: World,
}

impl Session {
    fn assemble(config: GameConfig, catalog: Arc<Catalog>, world: World) -> Self {
        let store = SaveStore::from_config(&config.save);
        let settings = EngineSettings {
            seed: config.seed,
            economy: config.economy.clone(),
            autosave_interval_days: config.save.interval_days,
            store: Some(store.clone()),
        };
        let engine = EngineBuilder::new(settings, Arc::clone(&catalog))
            .with_day_cycle()
            .build();
        Self {
            config,
            catalog,
            store,
            engine,
            world,
        }
    }

    /// Generates a fresh map, saves it and reads it back through the same
    /// path an ordinary load takes.
    pub fn new_game(config: GameConfig, catalog: Arc<Catalog>) -> Result<Self> {
        Self::new_game_with_progress(config, catalog, LoadProgress::new())
    }

    pub fn new_game_with_progress(
        config: GameConfig,
        catalog: Arc<Catalog>,
        progress: LoadProgress,
    ) -> Result<Self> {
        let generated = MapGenerator::new(&catalog, &config)
            .with_progress(progress)
            .generate(config.seed);
        let inventory = Inventory::new(config.starting_inventory, config.resource_max);
        let fresh = World::new(generated.grid, inventory);

        let store = SaveStore::from_config(&config.save);
        let world = match store.save(&fresh) {
            Ok(_) => store
                .load(config.metrics(), config.resource_max)
                .context("failed to read back the freshly generated map")?,
            Err(err) => {
                warn!(error = %err, "session.initial_save_failed");
                fresh
            }
        };
        info!(
            name = %config.name,
            seed = config.seed,
            bounds = world.grid().bounds(),
            town_hall = %generated.town_hall,
            "session.new_game"
        );
        Ok(Self::assemble(config, catalog, world))
    }

    pub fn continue_game(config: GameConfig, catalog: Arc<Catalog>) -> Result<Self> {
        let store = SaveStore::from_config(&config.save);
        let world = store
            .load(config.metrics(), config.resource_max)
            .with_context(|| format!("failed to load {}", store.primary_path().display()))?;
        info!(day = world.day(), "session.continued");
        Ok(Self::assemble(config, catalog, world))
    }

    /// Continues when a save exists, otherwise starts over.
    pub fn open(config: GameConfig, catalog: Arc<Catalog>) -> Result<Self> {
        if SaveStore::from_config(&config.save).has_save() {
            Self::continue_game(config, catalog)
        } else {
            Self::new_game(config, catalog)
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    pub fn place(&mut self, pos: TilePos, kind: BuildingKind) -> Result<Placement, PlacementError> {
        let mut rng = self.engine.rng(PLACEMENT_STREAM);
        let (grid, inventory) = self.world.parts_mut();
        let result = placement::try_place(grid, inventory, &self.catalog, pos, kind, &mut rng);
        if let Err(err) = &result {
            info!(
                x = pos.x,
                y = pos.y,
                building = ?kind,
                reason = %err,
                "session.placement_rejected"
            );
        }
        result
    }

    pub fn delete(&mut self, pos: TilePos) -> Result<Removal, DeletionError> {
        let (grid, inventory) = self.world.parts_mut();
        let result = placement::delete_building(grid, inventory, pos);
        if let Err(err) = &result {
            info!(x = pos.x, y = pos.y, reason = %err, "session.deletion_rejected");
        }
        result
    }

    pub fn advance_day(&mut self) -> DaySummary {
        self.engine.advance_day(&mut self.world)
    }

    pub fn save(&self) -> Result<PathBuf, PersistenceError> {
        self.store.save(&self.world)
    }

    /// Replaces the live world with whatever is on disk.
    pub fn reload(&mut self) -> Result<(), PersistenceError> {
        self.world = self
            .store
            .load(self.config.metrics(), self.config.resource_max)?;
        Ok(())
    }

    pub fn snapshot(&self) -> GameStateData {
        snapshot::capture(&self.world)
    }

    pub fn apply(&mut self, command: Command) -> CommandOutcome {
        match command {
            Command::PlaceBuilding { pos, kind } => match self.place(pos, kind) {
                Ok(placed) => CommandOutcome::Placed(placed),
                Err(err) => CommandOutcome::PlacementRejected { pos, kind, error: err },
            },
            Command::DeleteBuilding(pos) => match self.delete(pos) {
                Ok(removal) => CommandOutcome::Removed(removal),
                Err(err) => CommandOutcome::DeletionRejected { pos, error: err },
            },
            Command::SelectTile(pos) => {
                let selected = self.world.grid.contains(pos).then_some(pos);
                self.world.selection.selected_tile = selected;
                CommandOutcome::Updated
            }
            Command::HoverTile(pos) => {
                self.world.selection.hovered_tile = pos.filter(|p| self.world.grid.contains(*p));
                self.refresh_glow();
                CommandOutcome::Updated
            }
            Command::SetSelectedObject(kind) => {
                self.world.selection.selected_object = kind;
                self.refresh_glow();
                CommandOutcome::Updated
            }
            Command::PreviewRoad(path) => {
                self.preview_road(&path);
                CommandOutcome::Updated
            }
            Command::BuildRoad(path) => {
                self.preview_road(&[]);
                let mut built = Vec::new();
                let mut rejected = Vec::new();
                for pos in path {
                    match self.place(pos, BuildingKind::Road) {
                        Ok(placed) => built.push(placed),
                        Err(err) => rejected.push((pos, err)),
                    }
                }
                CommandOutcome::RoadBuilt { built, rejected }
            }
        }
    }

    /// Lights up the footprint the selected building would cover at the
    /// hovered tile.
    fn refresh_glow(&mut self) {
        let grid = &mut self.world.grid;
        grid.clear_glow();
        let selection = &self.world.selection;
        let (Some(kind), Some(pos)) = (selection.selected_object, selection.hovered_tile) else {
            return;
        };
        let range = self.catalog.preset(kind).range;
        let mut footprint = grid.within_range(pos, range);
        footprint.push(pos);
        for p in footprint {
            if let Some(tile) = grid.get_mut(p) {
                tile.is_glowing = true;
            }
        }
    }

    fn preview_road(&mut self, path: &[TilePos]) {
        let grid = &mut self.world.grid;
        grid.clear_road_previews();
        for pos in path {
            if let Some(tile) = grid.get_mut(*pos) {
                if tile.is_visible && tile.object.is_empty() {
                    tile.is_previewing_road = true;
                }
            }
        }
        grid.refresh_all_road_textures();
    }
}

/// Result of applying one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Placed(Placement),
    PlacementRejected {
        pos: TilePos,
        kind: BuildingKind,
        error: PlacementError,
    },
    Removed(Removal),
    DeletionRejected {
        pos: TilePos,
        error: DeletionError,
    },
    RoadBuilt {
        built: Vec<Placement>,
        rejected: Vec<(TilePos, PlacementError)>,
    },
    Updated,
}
