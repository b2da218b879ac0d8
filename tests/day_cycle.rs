use std::sync::Arc;

use tileburg::{
    catalog::{BuildingKind, Catalog, Channel, ResourceKind, Resources},
    config::{EconomyConfig, GameConfig, Profile},
    engine::{Engine, EngineBuilder, EngineSettings},
    grid::{Grid, TileMetrics, TileObject, TilePos},
    session::Session,
    world::{Inventory, World},
};

fn engine(economy: EconomyConfig) -> Engine {
    let settings = EngineSettings {
        seed: 3,
        economy,
        autosave_interval_days: 0,
        store: None,
    };
    EngineBuilder::new(settings, Arc::new(Catalog::standard()))
        .with_day_cycle()
        .build()
}

fn put(grid: &mut Grid, catalog: &Catalog, pos: TilePos, kind: BuildingKind) {
    let id = grid.allocate_object_id();
    grid.set_object(pos, TileObject::from_preset(id, catalog.preset(kind), 0));
}

fn put_resource(grid: &mut Grid, catalog: &Catalog, pos: TilePos, kind: ResourceKind) {
    let id = grid.allocate_object_id();
    grid.set_object(pos, TileObject::resource(id, kind, 0, catalog));
}

#[test]
fn food_is_baseline_minus_worker_upkeep() {
    let catalog = Catalog::standard();
    let mut grid = Grid::new(5, TileMetrics::default());
    put(&mut grid, &catalog, TilePos::new(2, 2), BuildingKind::TownHall);
    let mut world = World::new(
        grid,
        Inventory::new(Resources::ZERO.with(Channel::Food, 10), 100_000),
    );

    let summary = engine(EconomyConfig::default()).advance_day(&mut world);

    assert_eq!(summary.total_workers, 20);
    assert_eq!(world.inventory().get(Channel::Food), 10 + 60 - 2 * 20);
    assert_eq!(world.inventory().get(Channel::Workers), 20);
    assert_eq!(world.inventory().get(Channel::Energy), 30);
    assert_eq!(world.inventory().get(Channel::Gold), 10);
    assert_eq!(world.day(), 1);
}

#[test]
fn workers_and_energy_are_rederived_not_accumulated() {
    let catalog = Catalog::standard();
    let mut grid = Grid::new(5, TileMetrics::default());
    put(&mut grid, &catalog, TilePos::new(2, 2), BuildingKind::TownHall);
    let mut world = World::new(grid, Inventory::new(Resources::ZERO, 100_000));
    let mut engine = engine(EconomyConfig::default());
    for _ in 0..3 {
        engine.advance_day(&mut world);
    }
    assert_eq!(world.inventory().get(Channel::Workers), 20);
    assert_eq!(world.inventory().get(Channel::Energy), 30);
    assert_eq!(world.inventory().get(Channel::Gold), 30);
}

#[test]
fn food_reset_flag_drops_carried_food() {
    let catalog = Catalog::standard();
    let mut grid = Grid::new(5, TileMetrics::default());
    put(&mut grid, &catalog, TilePos::new(2, 2), BuildingKind::TownHall);
    let mut world = World::new(
        grid,
        Inventory::new(Resources::ZERO.with(Channel::Food, 500), 100_000),
    );
    let economy = EconomyConfig {
        reset_food_each_cycle: true,
        ..EconomyConfig::default()
    };
    engine(economy).advance_day(&mut world);
    assert_eq!(world.inventory().get(Channel::Food), 60 - 40);
}

#[test]
fn light_sources_define_visibility_each_cycle() {
    let catalog = Catalog::standard();
    let mut grid = Grid::new(25, TileMetrics::default());
    let hall = TilePos::new(5, 5);
    let line = TilePos::new(18, 18);
    put(&mut grid, &catalog, hall, BuildingKind::TownHall);
    put(&mut grid, &catalog, line, BuildingKind::PowerLine);
    for tile in grid.tiles_mut() {
        tile.is_visible = true;
    }
    let mut world = World::new(grid, Inventory::new(Resources::ZERO, 100_000));

    engine(EconomyConfig::default()).advance_day(&mut world);

    let hall_range = catalog.preset(BuildingKind::TownHall).range;
    let line_range = catalog.preset(BuildingKind::PowerLine).range;
    for tile in world.grid().tiles() {
        let lit = tile.pos.chebyshev(hall) <= hall_range || tile.pos.chebyshev(line) <= line_range;
        assert_eq!(tile.is_visible, lit, "tile {}", tile.pos);
    }
}

#[test]
fn quarry_output_is_stable_across_cycles() {
    let catalog = Catalog::standard();
    let mut grid = Grid::new(12, TileMetrics::default());
    let quarry = TilePos::new(6, 6);
    put(&mut grid, &catalog, quarry, BuildingKind::Quarry);
    put_resource(&mut grid, &catalog, TilePos::new(4, 4), ResourceKind::Stone);
    put_resource(&mut grid, &catalog, TilePos::new(8, 6), ResourceKind::Stone);
    put_resource(&mut grid, &catalog, TilePos::new(6, 9), ResourceKind::Coal);
    put_resource(&mut grid, &catalog, TilePos::new(9, 9), ResourceKind::Iron);
    put_resource(&mut grid, &catalog, TilePos::new(0, 0), ResourceKind::Iron);
    let mut world = World::new(grid, Inventory::new(Resources::ZERO, 100_000));
    let mut engine = engine(EconomyConfig::default());

    for day in 1..=5 {
        engine.advance_day(&mut world);
        let output = world.grid().get(quarry).unwrap().object.output;
        assert_eq!((output.stone, output.coal, output.iron), (4, 1, 1));
        assert_eq!(world.inventory().get(Channel::Stone), 4 * day);
        assert_eq!(world.inventory().get(Channel::Coal), day);
        assert_eq!(world.inventory().get(Channel::Iron), day);
    }
}

#[test]
fn session_autosaves_every_ten_days() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GameConfig::for_profile(Profile::Mobile);
    config.save.dir = dir.path().to_path_buf();

    let mut session = Session::new_game(config.clone(), Arc::new(Catalog::standard())).unwrap();
    let saved: Vec<bool> = (0..20)
        .map(|_| session.advance_day().saved_to.is_some())
        .collect();
    let expected: Vec<bool> = (1..=20).map(|day| day % 10 == 0).collect();
    assert_eq!(saved, expected);

    let resumed = Session::continue_game(config, Arc::new(Catalog::standard())).unwrap();
    assert_eq!(resumed.world().day(), 20);
}
