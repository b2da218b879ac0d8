use anyhow::{Context, Result};
use tracing::warn;

use crate::{
    catalog::{Catalog, ObjectType, Resources},
    engine::{System, SystemContext},
    grid::TilePos,
    rng::SystemRng,
    world::World,
};

/// Walks every building in x-then-y order: recomputes harvester output from
/// the resources in range, lets light sources reveal the map and books each
/// building's cost and output against the inventory.
pub struct ProductionSystem;

impl ProductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let buildings: Vec<TilePos> = world
            .grid
            .tiles()
            .filter(|t| t.object.kind.object_type() == ObjectType::Building)
            .map(|t| t.pos)
            .collect();

        for pos in buildings {
            match process_building(ctx.catalog, world, pos) {
                Ok(()) => world.cycle.buildings_processed += 1,
                Err(err) => {
                    world.cycle.buildings_failed += 1;
                    warn!(x = pos.x, y = pos.y, error = %err, "production.building_failed");
                }
            }
        }
        Ok(())
    }
}

fn process_building(catalog: &Catalog, world: &mut World, pos: TilePos) -> Result<()> {
    let kind = world
        .grid
        .get(pos)
        .and_then(|t| t.object.building())
        .with_context(|| format!("no building at {pos}"))?;
    let preset = catalog.preset(kind);

    if let Some(linked) = catalog.linked_resources(kind) {
        let mut output = preset.output;
        for near in world.grid.within_range(pos, preset.range) {
            let Some(resource) = world.grid.get(near).and_then(|t| t.object.resource_kind())
            else {
                continue;
            };
            if !linked.contains(&resource) {
                continue;
            }
            if let Some(y) = catalog.yield_for(resource) {
                *output.get_mut(y.channel) += y.amount;
                *world.cycle.harvested.get_mut(y.channel) += y.amount;
            }
        }
        let tile = world
            .grid
            .get_mut(pos)
            .with_context(|| format!("tile {pos} vanished"))?;
        tile.object.output = output;
    }

    if preset.light_source {
        world.grid.reveal(pos, preset.range);
    }

    let (cost, output) = match world.grid.get(pos) {
        Some(tile) => (tile.object.cost, tile.object.output),
        None => (Resources::ZERO, Resources::ZERO),
    };
    world.inventory.add_all(&output);
    world.inventory.remove_all(&cost);
    for (channel, amount) in cost.iter() {
        *world.cycle.demanded.get_mut(channel) += amount;
    }
    world.cycle.total_workers += output.workers;
    Ok(())
}
