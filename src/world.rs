use serde::{Deserialize, Serialize};

use crate::{
    catalog::{BuildingKind, Channel, Resources},
    grid::{Grid, TilePos},
};

pub const DAYS_PER_YEAR: u32 = 365;

/// The player's resource ledger. Every mutation clamps into
/// `[0, resource_max]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    balances: Resources,
    resource_max: i32,
}

impl Inventory {
    pub fn new(start: Resources, resource_max: i32) -> Self {
        let mut inventory = Self {
            balances: Resources::ZERO,
            resource_max: resource_max.max(0),
        };
        for (channel, amount) in start.iter() {
            inventory.set(channel, amount);
        }
        inventory
    }

    pub fn balances(&self) -> Resources {
        self.balances
    }

    pub fn resource_max(&self) -> i32 {
        self.resource_max
    }

    pub fn get(&self, channel: Channel) -> i32 {
        self.balances.get(channel)
    }

    pub fn set(&mut self, channel: Channel, amount: i32) {
        *self.balances.get_mut(channel) = amount.clamp(0, self.resource_max);
    }

    pub fn add(&mut self, channel: Channel, amount: i32) {
        let next = self.get(channel).saturating_add(amount);
        self.set(channel, next);
    }

    pub fn remove(&mut self, channel: Channel, amount: i32) {
        let next = self.get(channel).saturating_sub(amount);
        self.set(channel, next);
    }

    /// Debits `amount` only when the balance covers it.
    pub fn request(&mut self, channel: Channel, amount: i32) -> bool {
        if self.get(channel) >= amount {
            self.remove(channel, amount);
            true
        } else {
            false
        }
    }

    pub fn add_all(&mut self, amounts: &Resources) {
        for (channel, amount) in amounts.iter() {
            self.add(channel, amount);
        }
    }

    pub fn remove_all(&mut self, amounts: &Resources) {
        for (channel, amount) in amounts.iter() {
            self.remove(channel, amount);
        }
    }

    /// First channel (in [`Channel::ALL`] order) the balance cannot cover.
    pub fn shortfall(&self, amounts: &Resources) -> Option<Channel> {
        amounts
            .iter()
            .find(|(channel, amount)| *amount > self.get(*channel))
            .map(|(channel, _)| channel)
    }
}

/// Scratch state shared between the systems of one day cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleLedger {
    pub total_workers: i32,
    pub harvested: Resources,
    pub demanded: Resources,
    pub buildings_processed: usize,
    pub buildings_failed: usize,
    pub shortages: Vec<Channel>,
}

/// Cursor state exposed to presentation collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected_object: Option<BuildingKind>,
    pub selected_tile: Option<TilePos>,
    pub hovered_tile: Option<TilePos>,
}

#[derive(Debug)]
pub struct World {
    pub(crate) grid: Grid,
    pub(crate) inventory: Inventory,
    day: u32,
    pub(crate) day_time: f32,
    pub(crate) cycle: CycleLedger,
    pub(crate) selection: Selection,
}

impl World {
    pub fn new(grid: Grid, inventory: Inventory) -> Self {
        Self {
            grid,
            inventory,
            day: 0,
            day_time: 0.0,
            cycle: CycleLedger::default(),
            selection: Selection::default(),
        }
    }

    pub fn with_day(mut self, day: u32, day_time: f32) -> Self {
        self.day = day;
        self.day_time = day_time;
        self
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn year(&self) -> u32 {
        self.day / DAYS_PER_YEAR
    }

    pub fn day_time(&self) -> f32 {
        self.day_time
    }

    /// Fraction of the current day that has elapsed, clamped to `[0, 1)`.
    pub fn set_day_time(&mut self, day_time: f32) {
        self.day_time = day_time.clamp(0.0, 0.999);
    }

    pub fn advance_day(&mut self) {
        self.day += 1;
        self.day_time = 0.0;
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    /// Grid and inventory borrowed together, as placement needs both.
    pub fn parts_mut(&mut self) -> (&mut Grid, &mut Inventory) {
        (&mut self.grid, &mut self.inventory)
    }

    pub fn cycle(&self) -> &CycleLedger {
        &self.cycle
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn town_hall(&self) -> Option<TilePos> {
        self.grid.find_building(BuildingKind::TownHall)
    }

    pub fn total_residents(&self) -> usize {
        self.grid.tiles().map(|t| t.object.residents.len()).sum()
    }
}
