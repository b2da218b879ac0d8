use anyhow::Result;

use crate::{
    catalog::Channel,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

/// Civic baseline income followed by the food bill for every worker,
/// baseline workers included.
pub struct UpkeepSystem;

impl UpkeepSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpkeepSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for UpkeepSystem {
    fn name(&self) -> &str {
        "upkeep"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let baseline = ctx.economy.baseline;
        world.inventory.add_all(&baseline);
        world.cycle.total_workers += baseline.workers;

        let food_bill = ctx.economy.food_per_worker * world.cycle.total_workers;
        world.inventory.remove(Channel::Food, food_bill);
        world.cycle.demanded.food += food_bill;
        Ok(())
    }
}
