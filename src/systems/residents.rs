use anyhow::Result;
use rand::Rng;

use crate::{
    catalog::Channel,
    engine::{System, SystemContext},
    grid::Resident,
    rng::{SystemRng, RESIDENTS_STREAM},
    world::World,
};

pub const EDUCATION_INTERVAL_DAYS: u32 = 30;
const STAT_MAX: u8 = 100;

/// Ages residents and drifts their wellbeing with this cycle's shortages.
pub struct ResidentsSystem;

impl ResidentsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResidentsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ResidentsSystem {
    fn name(&self) -> &str {
        RESIDENTS_STREAM
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let hungry = world.cycle.shortages.contains(&Channel::Food);
        let dark = world.cycle.shortages.contains(&Channel::Energy);
        for tile in world.grid.tiles_mut() {
            for resident in &mut tile.object.residents {
                live_one_day(resident, hungry, dark, rng);
            }
        }
        Ok(())
    }
}

fn drift<R: Rng + ?Sized>(value: u8, short: bool, rng: &mut R) -> u8 {
    if short {
        value.saturating_sub(rng.gen_range(1..=3))
    } else {
        value.saturating_add(1).min(STAT_MAX)
    }
}

pub(crate) fn live_one_day<R: Rng + ?Sized>(
    resident: &mut Resident,
    hungry: bool,
    dark: bool,
    rng: &mut R,
) {
    resident.days_alive += 1;
    if resident.days_alive % EDUCATION_INTERVAL_DAYS == 0 {
        resident.education = resident.education.saturating_add(1).min(STAT_MAX);
    }
    resident.health = drift(resident.health, hungry, rng);
    resident.happiness = drift(resident.happiness, dark, rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn education_grows_every_thirty_days() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut resident = Resident::new("Ada");
        for _ in 0..61 {
            live_one_day(&mut resident, false, false, &mut rng);
        }
        assert_eq!(resident.days_alive, 61);
        assert_eq!(resident.education, 2);
        assert_eq!(resident.health, 100);
        assert_eq!(resident.happiness, 100);
    }

    #[test]
    fn shortages_wear_residents_down_without_underflow() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut resident = Resident::new("Bram");
        live_one_day(&mut resident, true, true, &mut rng);
        assert!(resident.health < 100 && resident.health >= 97);
        assert!(resident.happiness < 50);
        for _ in 0..200 {
            live_one_day(&mut resident, true, true, &mut rng);
        }
        assert_eq!(resident.health, 0);
        assert_eq!(resident.happiness, 0);
    }
}
