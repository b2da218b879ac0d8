//! Save-file format and the rotating primary/backup store.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    catalog::{CatalogError, ObjectKind, Resources},
    config::SaveConfig,
    grid::{Grid, Resident, Terrain, Tile, TileMetrics, TileObject, TilePos, Vec2},
    world::{Inventory, World},
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no save found at {0}")]
    NoSave(PathBuf),
    #[error("save file {0} is empty")]
    Empty(PathBuf),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save file {path} is not valid game state")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode game state")]
    Encode(#[source] serde_json::Error),
    #[error("save holds {found} tiles, which is not a square grid")]
    NotSquare { found: usize },
    #[error("tile index ({x}, {y}) is outside the grid or appears twice")]
    BadTileIndex { x: i32, y: i32 },
    #[error(transparent)]
    UnknownObject(#[from] CatalogError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InventoryRecord {
    pub gold: i32,
    pub wood: i32,
    pub coal: i32,
    pub iron: i32,
    pub stone: i32,
    pub workers: i32,
    pub energy: i32,
    pub food: i32,
}

impl From<Resources> for InventoryRecord {
    fn from(r: Resources) -> Self {
        Self {
            gold: r.gold,
            wood: r.wood,
            coal: r.coal,
            iron: r.iron,
            stone: r.stone,
            workers: r.workers,
            energy: r.energy,
            food: r.food,
        }
    }
}

impl From<InventoryRecord> for Resources {
    fn from(r: InventoryRecord) -> Self {
        Resources {
            gold: r.gold,
            wood: r.wood,
            coal: r.coal,
            iron: r.iron,
            stone: r.stone,
            workers: r.workers,
            energy: r.energy,
            food: r.food,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CostRecord {
    pub gold_cost: i32,
    pub wood_cost: i32,
    pub coal_cost: i32,
    pub iron_cost: i32,
    pub stone_cost: i32,
    pub workers_cost: i32,
    pub energy_cost: i32,
    pub food_cost: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpfrontRecord {
    pub gold_upfront: i32,
    pub wood_upfront: i32,
    pub coal_upfront: i32,
    pub iron_upfront: i32,
    pub stone_upfront: i32,
    pub workers_upfront: i32,
    pub energy_upfront: i32,
    pub food_upfront: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OutputRecord {
    pub gold_output: i32,
    pub wood_output: i32,
    pub coal_output: i32,
    pub iron_output: i32,
    pub stone_output: i32,
    pub workers_output: i32,
    pub energy_output: i32,
    pub food_output: i32,
}

impl From<Resources> for CostRecord {
    fn from(r: Resources) -> Self {
        Self {
            gold_cost: r.gold,
            wood_cost: r.wood,
            coal_cost: r.coal,
            iron_cost: r.iron,
            stone_cost: r.stone,
            workers_cost: r.workers,
            energy_cost: r.energy,
            food_cost: r.food,
        }
    }
}

impl From<CostRecord> for Resources {
    fn from(r: CostRecord) -> Self {
        Resources {
            gold: r.gold_cost,
            wood: r.wood_cost,
            coal: r.coal_cost,
            iron: r.iron_cost,
            stone: r.stone_cost,
            workers: r.workers_cost,
            energy: r.energy_cost,
            food: r.food_cost,
        }
    }
}

impl From<Resources> for UpfrontRecord {
    fn from(r: Resources) -> Self {
        Self {
            gold_upfront: r.gold,
            wood_upfront: r.wood,
            coal_upfront: r.coal,
            iron_upfront: r.iron,
            stone_upfront: r.stone,
            workers_upfront: r.workers,
            energy_upfront: r.energy,
            food_upfront: r.food,
        }
    }
}

impl From<UpfrontRecord> for Resources {
    fn from(r: UpfrontRecord) -> Self {
        Resources {
            gold: r.gold_upfront,
            wood: r.wood_upfront,
            coal: r.coal_upfront,
            iron: r.iron_upfront,
            stone: r.stone_upfront,
            workers: r.workers_upfront,
            energy: r.energy_upfront,
            food: r.food_upfront,
        }
    }
}

impl From<Resources> for OutputRecord {
    fn from(r: Resources) -> Self {
        Self {
            gold_output: r.gold,
            wood_output: r.wood,
            coal_output: r.coal,
            iron_output: r.iron,
            stone_output: r.stone,
            workers_output: r.workers,
            energy_output: r.energy,
            food_output: r.food,
        }
    }
}

impl From<OutputRecord> for Resources {
    fn from(r: OutputRecord) -> Self {
        Resources {
            gold: r.gold_output,
            wood: r.wood_output,
            coal: r.coal_output,
            iron: r.iron_output,
            stone: r.stone_output,
            workers: r.workers_output,
            energy: r.energy_output,
            food: r.food_output,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRecord {
    pub id: u32,
    pub type_id: i32,
    pub object_id: i32,
    pub texture_index: i32,
    #[serde(flatten)]
    pub cost: CostRecord,
    #[serde(flatten)]
    pub upfront: UpfrontRecord,
    #[serde(flatten)]
    pub output: OutputRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub residents: Vec<Resident>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TileRecord {
    pub tile_index: Vec2,
    pub position: Vec2,
    pub terrain_id: i32,
    pub is_visible: bool,
    pub object: ObjectRecord,
}

/// Everything needed to resume a session. The year is derived from the day
/// and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameStateData {
    pub day: u32,
    pub day_time: f32,
    pub player_inventory: InventoryRecord,
    pub tile_data: Vec<TileRecord>,
}

pub fn capture(world: &World) -> GameStateData {
    let tile_data = world
        .grid()
        .tiles()
        .map(|tile| TileRecord {
            tile_index: Vec2 {
                x: tile.pos.x as f32,
                y: tile.pos.y as f32,
            },
            position: tile.position,
            terrain_id: tile.terrain.id(),
            is_visible: tile.is_visible,
            object: ObjectRecord {
                id: tile.object.id,
                type_id: tile.object.type_id(),
                object_id: tile.object.object_id(),
                texture_index: tile.object.texture_index,
                cost: tile.object.cost.into(),
                upfront: tile.object.upfront.into(),
                output: tile.object.output.into(),
                residents: tile.object.residents.clone(),
            },
        })
        .collect();

    GameStateData {
        day: world.day(),
        day_time: world.day_time(),
        player_inventory: world.inventory().balances().into(),
        tile_data,
    }
}

/// Rebuilds a world from a snapshot. The grid edge is inferred from the
/// tile count, which must be a perfect square, and every cell must appear
/// exactly once.
pub fn restore(
    data: &GameStateData,
    metrics: TileMetrics,
    resource_max: i32,
) -> Result<World, PersistenceError> {
    let found = data.tile_data.len();
    let bounds = (found as f64).sqrt().round() as i32;
    if found == 0 || (bounds as usize) * (bounds as usize) != found {
        return Err(PersistenceError::NotSquare { found });
    }

    let mut tiles = Vec::with_capacity(found);
    let mut seen = HashSet::with_capacity(found);
    for record in &data.tile_data {
        let pos = TilePos::new(
            record.tile_index.x.round() as i32,
            record.tile_index.y.round() as i32,
        );
        let in_bounds = (0..bounds).contains(&pos.x) && (0..bounds).contains(&pos.y);
        if !in_bounds || !seen.insert(pos) {
            return Err(PersistenceError::BadTileIndex { x: pos.x, y: pos.y });
        }
        let kind = ObjectKind::from_ids(record.object.type_id, record.object.object_id)?;
        let object = if kind.is_empty() {
            TileObject::empty()
        } else {
            TileObject {
                id: record.object.id,
                kind,
                texture_index: record.object.texture_index,
                upfront: record.object.upfront.into(),
                cost: record.object.cost.into(),
                output: record.object.output.into(),
                residents: record.object.residents.clone(),
            }
        };
        tiles.push(Tile {
            pos,
            position: record.position,
            terrain: Terrain::from_id(record.terrain_id),
            object,
            is_visible: record.is_visible,
            is_glowing: false,
            is_previewing_road: false,
            destroyed_fx: false,
        });
    }

    let grid = Grid::from_tiles(bounds, metrics, tiles);
    let inventory = Inventory::new(data.player_inventory.into(), resource_max);
    Ok(World::new(grid, inventory).with_day(data.day, data.day_time))
}

/// Writes `{path}.tmp`, syncs it, then renames it over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_state(path: &Path) -> Result<GameStateData, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(PersistenceError::NoSave(path.to_path_buf()))
        }
        Err(err) => return Err(io_error(path)(err)),
    };
    if text.trim().is_empty() {
        return Err(PersistenceError::Empty(path.to_path_buf()));
    }
    serde_json::from_str(&text).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// A primary save file plus a single rotating backup.
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
    file_name: String,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_config(config: &SaveConfig) -> Self {
        Self::new(&config.dir, &config.file_name)
    }

    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(format!("{}.bak", self.file_name))
    }

    /// True when either slot holds a file worth trying.
    pub fn has_save(&self) -> bool {
        self.primary_path().exists() || self.backup_path().exists()
    }

    /// Drops the old backup, demotes the primary to backup, then writes the
    /// new primary.
    pub fn save(&self, world: &World) -> Result<PathBuf, PersistenceError> {
        let bytes = serde_json::to_vec_pretty(&capture(world)).map_err(PersistenceError::Encode)?;
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let primary = self.primary_path();
        let backup = self.backup_path();
        if backup.exists() {
            fs::remove_file(&backup).map_err(io_error(&backup))?;
        }
        if primary.exists() {
            fs::rename(&primary, &backup).map_err(io_error(&primary))?;
        }
        atomic_write(&primary, &bytes).map_err(io_error(&primary))?;

        info!(path = %primary.display(), day = world.day(), "save.written");
        Ok(primary)
    }

    /// Opens the primary, falling back to the backup when the primary is
    /// missing or `open` rejects it for any reason.
    fn open_slot<T>(
        &self,
        open: impl Fn(&Path) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let primary = self.primary_path();
        let primary_err = match open(&primary) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let backup = self.backup_path();
        match open(&backup) {
            Ok(value) => {
                warn!(
                    primary = %primary.display(),
                    error = %primary_err,
                    "save.backup_fallback"
                );
                Ok(value)
            }
            Err(backup_err) => {
                debug!(error = %backup_err, "save.backup_unusable");
                Err(primary_err)
            }
        }
    }

    /// Raw save data, from the backup if the primary cannot be read.
    pub fn load_data(&self) -> Result<GameStateData, PersistenceError> {
        self.open_slot(read_state)
    }

    /// Reads and rebuilds the world. A primary that parses but cannot be
    /// rebuilt also falls back to the backup.
    pub fn load(&self, metrics: TileMetrics, resource_max: i32) -> Result<World, PersistenceError> {
        self.open_slot(|path| restore(&read_state(path)?, metrics, resource_max))
    }
}
