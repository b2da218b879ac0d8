use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tileburg::{
    catalog::{BuildingKind, Catalog, Channel, Resources},
    grid::{Grid, TileMetrics, TilePos},
    placement::{self, DeletionError, PlacementError},
    world::{Inventory, World},
};

fn open_world(bounds: i32, start: Resources) -> World {
    let mut grid = Grid::new(bounds, TileMetrics::default());
    for tile in grid.tiles_mut() {
        tile.is_visible = true;
    }
    World::new(grid, Inventory::new(start, 1_000_000))
}

fn rich() -> Resources {
    Channel::ALL
        .into_iter()
        .fold(Resources::ZERO, |r, c| r.with(c, 10_000))
}

fn place(
    world: &mut World,
    catalog: &Catalog,
    pos: TilePos,
    kind: BuildingKind,
) -> Result<placement::Placement, PlacementError> {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let (grid, inventory) = world.parts_mut();
    placement::try_place(grid, inventory, catalog, pos, kind, &mut rng)
}

#[test]
fn affordability_boundary_is_inclusive() {
    let standard = Catalog::standard();
    let mut preset = standard.preset(BuildingKind::PowerLine).clone();
    preset.upfront = Resources::ZERO.with(Channel::Gold, 100);
    let exact = Catalog::standard().with_preset(preset.clone());
    preset.upfront = Resources::ZERO.with(Channel::Gold, 101);
    let too_dear = Catalog::standard().with_preset(preset);

    let budget = Resources::ZERO.with(Channel::Gold, 100);

    let mut world = open_world(10, budget);
    place(&mut world, &exact, TilePos::new(4, 4), BuildingKind::PowerLine).unwrap();
    assert_eq!(world.inventory().get(Channel::Gold), 0);

    let mut world = open_world(10, budget);
    let before = world.inventory().clone();
    let err = place(&mut world, &too_dear, TilePos::new(4, 4), BuildingKind::PowerLine)
        .unwrap_err();
    assert_eq!(err, PlacementError::InsufficientResources(Channel::Gold));
    assert_eq!(world.inventory(), &before);
    assert!(world.grid().get(TilePos::new(4, 4)).unwrap().object.is_empty());
}

#[test]
fn partial_affordability_debits_nothing() {
    let catalog = Catalog::standard();
    // enough gold for a windmill but no stone
    let start = Resources::ZERO
        .with(Channel::Gold, 500)
        .with(Channel::Wood, 500);
    let mut world = open_world(10, start);
    place(&mut world, &catalog, TilePos::new(2, 2), BuildingKind::Road).unwrap();
    let before = world.inventory().clone();
    let err = place(&mut world, &catalog, TilePos::new(2, 3), BuildingKind::Windmill).unwrap_err();
    assert_eq!(err, PlacementError::InsufficientResources(Channel::Stone));
    assert_eq!(world.inventory(), &before);
}

#[test]
fn second_log_cabin_in_range_is_rejected() {
    let catalog = Catalog::standard();
    let mut world = open_world(30, rich());
    for road in [TilePos::new(10, 9), TilePos::new(11, 9), TilePos::new(20, 19)] {
        place(&mut world, &catalog, road, BuildingKind::Road).unwrap();
    }
    place(&mut world, &catalog, TilePos::new(10, 10), BuildingKind::LogCabin).unwrap();
    assert_eq!(
        place(&mut world, &catalog, TilePos::new(11, 10), BuildingKind::LogCabin),
        Err(PlacementError::DuplicateHarvesterInRange)
    );
    place(&mut world, &catalog, TilePos::new(20, 20), BuildingKind::LogCabin).unwrap();
    assert_eq!(world.grid().count_buildings(BuildingKind::LogCabin), 2);
}

#[test]
fn different_harvesters_may_share_a_cluster() {
    let catalog = Catalog::standard();
    let mut world = open_world(12, rich());
    place(&mut world, &catalog, TilePos::new(5, 4), BuildingKind::Road).unwrap();
    place(&mut world, &catalog, TilePos::new(6, 4), BuildingKind::Road).unwrap();
    place(&mut world, &catalog, TilePos::new(5, 5), BuildingKind::LogCabin).unwrap();
    place(&mut world, &catalog, TilePos::new(6, 5), BuildingKind::Quarry).unwrap();
}

#[test]
fn checks_run_in_order() {
    let catalog = Catalog::standard();
    let mut world = open_world(8, Resources::ZERO);
    let target = TilePos::new(3, 3);

    world.grid_mut().get_mut(target).unwrap().is_visible = false;
    assert_eq!(
        place(&mut world, &catalog, target, BuildingKind::Farm),
        Err(PlacementError::NotVisible)
    );
    world.grid_mut().get_mut(target).unwrap().is_visible = true;
    // no road and no money: the road check comes first
    assert_eq!(
        place(&mut world, &catalog, target, BuildingKind::Farm),
        Err(PlacementError::NoAdjacentRoad)
    );
    assert_eq!(
        place(&mut world, &catalog, target, BuildingKind::PowerLine),
        Err(PlacementError::InsufficientResources(Channel::Gold))
    );
    assert_eq!(
        place(&mut world, &catalog, TilePos::new(9, 9), BuildingKind::Road),
        Err(PlacementError::OutOfBounds)
    );
}

#[test]
fn deletion_refunds_half_of_upfront_and_protects_the_hall() {
    let catalog = Catalog::standard();
    let mut world = open_world(10, rich());
    let hall = TilePos::new(5, 5);
    place(&mut world, &catalog, hall, BuildingKind::TownHall).unwrap();
    place(&mut world, &catalog, TilePos::new(5, 6), BuildingKind::Road).unwrap();
    place(&mut world, &catalog, TilePos::new(5, 7), BuildingKind::EliteHouse).unwrap();

    let before = world.inventory().balances();
    let (grid, inventory) = world.parts_mut();
    let removal = placement::delete_building(grid, inventory, TilePos::new(5, 7)).unwrap();
    let upfront = catalog.preset(BuildingKind::EliteHouse).upfront;
    for channel in Channel::ALL {
        assert_eq!(
            world.inventory().get(channel),
            before.get(channel) + upfront.get(channel) / 2
        );
    }
    assert_eq!(removal.refund.iron, 5);

    let (grid, inventory) = world.parts_mut();
    assert_eq!(
        placement::delete_building(grid, inventory, hall),
        Err(DeletionError::TownHallProtected)
    );
    let (grid, inventory) = world.parts_mut();
    assert_eq!(
        placement::delete_building(grid, inventory, TilePos::new(0, 0)),
        Err(DeletionError::EmptyTile)
    );
}
