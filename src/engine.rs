use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::{
    catalog::{Catalog, Resources},
    config::EconomyConfig,
    rng::{RngManager, SystemRng},
    snapshot::SaveStore,
    world::World,
};

pub struct EngineSettings {
    pub seed: u64,
    pub economy: EconomyConfig,
    /// Autosave every this many days; zero disables autosave.
    pub autosave_interval_days: u32,
    pub store: Option<SaveStore>,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    catalog: Arc<Catalog>,
    systems: Vec<Box<dyn System + Send>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, catalog: Arc<Catalog>) -> Self {
        Self {
            settings,
            catalog,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + Send + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Adds the standard day-cycle passes in their required order.
    pub fn with_day_cycle(self) -> Self {
        use crate::systems::{
            BookkeepingSystem, ProductionSystem, ResetSystem, ResidentsSystem, UpkeepSystem,
        };
        self.with_system(ResetSystem::new())
            .with_system(ProductionSystem::new())
            .with_system(UpkeepSystem::new())
            .with_system(BookkeepingSystem::new())
            .with_system(ResidentsSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            catalog: self.catalog,
            settings: self.settings,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
    pub failed: bool,
}

#[derive(Clone, Debug)]
pub struct DaySummary {
    /// The day that was just completed.
    pub day: u32,
    pub system_reports: Vec<SystemRunReport>,
    pub inventory: Resources,
    pub total_workers: i32,
    pub saved_to: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System + Send>>,
    catalog: Arc<Catalog>,
    settings: EngineSettings,
}

impl Engine {
    /// Named random stream shared with callers outside the day cycle.
    pub fn rng(&mut self, name: &str) -> SystemRng<'_> {
        self.rng.stream(name)
    }

    /// Runs every system once, then moves the calendar forward. A failing
    /// system is logged and the remaining systems still run; the day always
    /// advances.
    pub fn advance_day(&mut self, world: &mut World) -> DaySummary {
        let day = world.day();
        let mut system_reports = Vec::with_capacity(self.systems.len());
        for system in &mut self.systems {
            let name = system.name().to_string();
            let mut rng_stream = self.rng.stream(&name);
            let ctx = SystemContext {
                day,
                catalog: &self.catalog,
                economy: &self.settings.economy,
            };
            let start = Instant::now();
            let outcome = system.run(&ctx, world, &mut rng_stream);
            let failed = match outcome {
                Ok(()) => false,
                Err(err) => {
                    warn!(system = %name, day, error = %err, "engine.system_failed");
                    true
                }
            };
            system_reports.push(SystemRunReport {
                name,
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
                failed,
            });
        }

        world.advance_day();
        let saved_to = self.maybe_autosave(world);
        debug!(day = world.day(), "engine.day_advanced");

        DaySummary {
            day,
            system_reports,
            inventory: world.inventory().balances(),
            total_workers: world.cycle().total_workers,
            saved_to,
        }
    }

    pub fn run(&mut self, world: &mut World, days: u32) -> Vec<DaySummary> {
        (0..days).map(|_| self.advance_day(world)).collect()
    }

    fn maybe_autosave(&self, world: &World) -> Option<PathBuf> {
        let interval = self.settings.autosave_interval_days;
        if interval == 0 || world.day() % interval != 0 {
            return None;
        }
        let store = self.settings.store.as_ref()?;
        match store.save(world) {
            Ok(path) => Some(path),
            Err(err) => {
                error!(day = world.day(), error = %err, "engine.autosave_failed");
                None
            }
        }
    }
}

pub struct SystemContext<'a> {
    /// Day number at the start of the cycle.
    pub day: u32,
    pub catalog: &'a Catalog,
    pub economy: &'a EconomyConfig,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
