pub mod catalog;
pub mod config;
pub mod engine;
pub mod grid;
pub mod interaction;
pub mod mapgen;
pub mod placement;
pub mod rng;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod systems;
pub mod world;

pub use catalog::{BuildingKind, Catalog, Channel, ResourceKind, Resources};
pub use config::{ConfigLoader, GameConfig, Profile};
pub use engine::{DaySummary, Engine, EngineBuilder, EngineSettings};
pub use grid::{Grid, TilePos};
pub use session::Session;
pub use world::{Inventory, World};
