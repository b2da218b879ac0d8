use anyhow::Result;
use tracing::debug;

use crate::{
    catalog::Channel,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

/// Flags every channel that was asked for this cycle but ended the cycle
/// empty.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let balances = world.inventory.balances();
        let demanded = world.cycle.demanded;
        world.cycle.shortages = Channel::ALL
            .into_iter()
            .filter(|c| demanded.get(*c) > 0 && balances.get(*c) == 0)
            .collect();

        debug!(
            day = ctx.day,
            gold = balances.gold,
            food = balances.food,
            workers = world.cycle.total_workers,
            shortages = world.cycle.shortages.len(),
            "bookkeeping.cycle_closed"
        );
        Ok(())
    }
}
