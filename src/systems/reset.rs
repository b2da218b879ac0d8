use anyhow::Result;

use crate::{
    catalog::Channel,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{CycleLedger, World},
};

/// Zeroes the channels that are re-derived every day and hides the map so
/// light sources can reveal it again.
pub struct ResetSystem;

impl ResetSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResetSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ResetSystem {
    fn name(&self) -> &str {
        "reset"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        world.inventory.set(Channel::Workers, 0);
        world.inventory.set(Channel::Energy, 0);
        if ctx.economy.reset_food_each_cycle {
            world.inventory.set(Channel::Food, 0);
        }
        world.grid.clear_visibility();
        world.cycle = CycleLedger::default();
        Ok(())
    }
}
