//! Rules for placing and removing buildings.

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::{
    catalog::{
        BuildingKind, Catalog, Channel, ObjectKind, ResourceCategory, ResourceKind, Resources,
    },
    grid::{Grid, Resident, Terrain, TileObject, TilePos},
    world::Inventory,
};

/// Fraction of the upfront cost returned on deletion.
pub const REFUND_NUMERATOR: i32 = 1;
pub const REFUND_DENOMINATOR: i32 = 2;

const RESIDENT_NAMES: &[&str] = &[
    "Ada", "Bram", "Cora", "Dario", "Edda", "Finn", "Greta", "Hugo", "Ines", "Jonas", "Kaia",
    "Lior", "Mara", "Nils", "Oona", "Pavel", "Quinn", "Rosa", "Soren", "Tilde", "Ugo", "Vera",
    "Wim", "Yara",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("tile is outside the map")]
    OutOfBounds,
    #[error("the settlement already has a town hall")]
    TownHallUnique,
    #[error("tile is not visible")]
    NotVisible,
    #[error("tile is already occupied")]
    AlreadyOccupied,
    #[error("needs a road next to it")]
    NoAdjacentRoad,
    #[error("another harvester of this kind is already in range")]
    DuplicateHarvesterInRange,
    #[error("needs water next to it")]
    MissingAdjacentWater,
    #[error("not enough {0}")]
    InsufficientResources(Channel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeletionError {
    #[error("tile is outside the map")]
    OutOfBounds,
    #[error("nothing to remove")]
    EmptyTile,
    #[error("the town hall cannot be removed")]
    TownHallProtected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub pos: TilePos,
    pub kind: BuildingKind,
    pub object_id: u32,
    pub farmland_claimed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub pos: TilePos,
    pub removed: ObjectKind,
    pub refund: Resources,
}

fn is_open_water(grid: &Grid, pos: TilePos) -> bool {
    grid.get(pos).is_some_and(|t| {
        t.terrain == Terrain::Water
            && t.object
                .resource_kind()
                .is_some_and(|r| r.category() == ResourceCategory::Water)
    })
}

/// Runs every check without touching state. Checks short-circuit in a fixed
/// order so the player always sees the most basic problem first.
pub fn validate(
    grid: &Grid,
    inventory: &Inventory,
    catalog: &Catalog,
    pos: TilePos,
    kind: BuildingKind,
) -> Result<(), PlacementError> {
    let tile = grid.get(pos).ok_or(PlacementError::OutOfBounds)?;
    let preset = catalog.preset(kind);

    if kind == BuildingKind::TownHall && grid.find_building(BuildingKind::TownHall).is_some() {
        return Err(PlacementError::TownHallUnique);
    }
    if !tile.is_visible {
        return Err(PlacementError::NotVisible);
    }
    if !tile.object.is_empty() {
        return Err(PlacementError::AlreadyOccupied);
    }
    if preset.requires_road && kind != BuildingKind::Road && !grid.has_adjacent_road(pos) {
        return Err(PlacementError::NoAdjacentRoad);
    }
    if catalog.is_harvester(kind)
        && grid.count_within(pos, preset.range, |t| t.object.is_building(kind)) > 0
    {
        return Err(PlacementError::DuplicateHarvesterInRange);
    }
    if kind == BuildingKind::Watermill
        && !pos.neighbors8().into_iter().any(|p| is_open_water(grid, p))
    {
        return Err(PlacementError::MissingAdjacentWater);
    }
    if let Some(channel) = inventory.shortfall(&preset.upfront) {
        return Err(PlacementError::InsufficientResources(channel));
    }
    Ok(())
}

/// Validates and, on success, builds `kind` at `pos` and debits its upfront
/// cost.
pub fn try_place<R: Rng + ?Sized>(
    grid: &mut Grid,
    inventory: &mut Inventory,
    catalog: &Catalog,
    pos: TilePos,
    kind: BuildingKind,
    rng: &mut R,
) -> Result<Placement, PlacementError> {
    validate(grid, inventory, catalog, pos, kind)?;
    let preset = catalog.preset(kind);

    let texture = if kind == BuildingKind::Road {
        grid.road_texture_for(pos)
    } else {
        pick_texture(preset.texture_pool, rng)
    };
    let object_id = grid.allocate_object_id();
    let mut object = TileObject::from_preset(object_id, preset, texture);
    if kind.is_residence() {
        object.residents = new_residents(preset.output.workers, rng);
    }
    grid.set_object(pos, object);
    if let Some(tile) = grid.get_mut(pos) {
        tile.is_previewing_road = false;
        tile.destroyed_fx = false;
    }
    inventory.remove_all(&preset.upfront);

    let farmland_claimed = if kind == BuildingKind::Farm {
        claim_farmland(grid, catalog, pos, rng)
    } else {
        0
    };
    if preset.light_source {
        grid.reveal(pos, preset.range);
    }
    if kind == BuildingKind::Road {
        grid.refresh_road_textures(pos);
    }

    debug!(
        x = pos.x,
        y = pos.y,
        building = preset.name,
        farmland_claimed,
        "placement.accepted"
    );
    Ok(Placement {
        pos,
        kind,
        object_id,
        farmland_claimed,
    })
}

fn pick_texture<R: Rng + ?Sized>(pool: &[i32], rng: &mut R) -> i32 {
    match pool {
        [] => 0,
        [only] => *only,
        _ => pool[rng.gen_range(0..pool.len())],
    }
}

fn new_residents<R: Rng + ?Sized>(count: i32, rng: &mut R) -> Vec<Resident> {
    (0..count.max(0))
        .map(|_| Resident::new(RESIDENT_NAMES[rng.gen_range(0..RESIDENT_NAMES.len())]))
        .collect()
}

/// Turns the empty, visible ring around a new farm into farmland and credits
/// the farm's live food output for each claimed tile.
fn claim_farmland<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    farm: TilePos,
    rng: &mut R,
) -> usize {
    let ring: Vec<TilePos> = farm
        .neighbors8()
        .into_iter()
        .filter(|p| {
            grid.get(*p)
                .is_some_and(|t| t.is_visible && t.object.is_empty() && t.terrain != Terrain::Water)
        })
        .collect();

    let per_tile = catalog
        .yield_for(ResourceKind::Farmland)
        .map_or(0, |y| y.amount);
    for pos in &ring {
        let texture = pick_texture(ResourceKind::Farmland.texture_pool(), rng);
        let id = grid.allocate_object_id();
        grid.set_object(
            *pos,
            TileObject::resource(id, ResourceKind::Farmland, texture, catalog),
        );
    }
    if let Some(tile) = grid.get_mut(farm) {
        tile.object.output.food += per_tile * ring.len() as i32;
    }
    ring.len()
}

/// Clears a tile and refunds half of what the building cost to put down.
pub fn delete_building(
    grid: &mut Grid,
    inventory: &mut Inventory,
    pos: TilePos,
) -> Result<Removal, DeletionError> {
    let tile = grid.get(pos).ok_or(DeletionError::OutOfBounds)?;
    if tile.object.is_empty() {
        return Err(DeletionError::EmptyTile);
    }
    if tile.object.is_building(BuildingKind::TownHall) {
        return Err(DeletionError::TownHallProtected);
    }

    let removed = grid.clear_object(pos).ok_or(DeletionError::OutOfBounds)?;
    let refund = match removed.kind {
        ObjectKind::Building(_) => removed.upfront.scaled(REFUND_NUMERATOR, REFUND_DENOMINATOR),
        _ => Resources::ZERO,
    };
    inventory.add_all(&refund);
    if let Some(tile) = grid.get_mut(pos) {
        tile.destroyed_fx = true;
    }
    if removed.kind == ObjectKind::Building(BuildingKind::Road) {
        grid.refresh_road_textures(pos);
    }

    debug!(x = pos.x, y = pos.y, refund_gold = refund.gold, "placement.removed");
    Ok(Removal {
        pos,
        removed: removed.kind,
        refund,
    })
}
