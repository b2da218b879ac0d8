//! Session configuration loaded from YAML.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{Channel, Resources},
    grid::TileMetrics,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Desktop,
    Mobile,
}

impl Profile {
    pub fn bounds(self) -> i32 {
        match self {
            Profile::Desktop => 75,
            Profile::Mobile => 20,
        }
    }

    pub fn metrics(self) -> TileMetrics {
        match self {
            Profile::Desktop => TileMetrics {
                tile_width: 32.0,
                tile_height: 16.0,
            },
            Profile::Mobile => TileMetrics {
                tile_width: 64.0,
                tile_height: 32.0,
            },
        }
    }

    pub fn stub_roads(self) -> bool {
        matches!(self, Profile::Mobile)
    }
}

/// Odds for one resource kind during seeding. A draw in `[0, max)` must be
/// strictly greater than the threshold picked by the number of matching
/// neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedThresholds {
    pub max: u32,
    pub isolated: u32,
    pub one_neighbor: u32,
    pub two_neighbors: u32,
    pub crowded: u32,
}

impl SeedThresholds {
    pub const fn new(max: u32, isolated: u32, one: u32, two: u32, crowded: u32) -> Self {
        Self {
            max,
            isolated,
            one_neighbor: one,
            two_neighbors: two,
            crowded,
        }
    }

    pub fn threshold_for(&self, neighbors: usize) -> u32 {
        match neighbors {
            0 => self.isolated,
            1 => self.one_neighbor,
            2 => self.two_neighbors,
            _ => self.crowded,
        }
    }
}

fn default_water() -> SeedThresholds {
    SeedThresholds::new(1_000, 997, 700, 550, 350)
}

fn default_trees() -> SeedThresholds {
    SeedThresholds::new(1_000, 985, 700, 550, 450)
}

fn default_stone() -> SeedThresholds {
    SeedThresholds::new(1_000, 995, 750, 600, 500)
}

fn default_coal() -> SeedThresholds {
    SeedThresholds::new(1_000, 998, 800, 700, 600)
}

fn default_iron() -> SeedThresholds {
    SeedThresholds::new(1_000, 998, 820, 720, 620)
}

fn default_start_inset() -> i32 {
    2
}

fn default_first_chance() -> f64 {
    0.10
}

fn default_second_chance() -> f64 {
    0.50
}

fn default_scan_passes() -> u32 {
    20
}

fn default_min_grass_neighbors() -> usize {
    3
}

fn default_min_trees() -> usize {
    4
}

fn default_starting_stone() -> usize {
    3
}

fn default_stub_road_length() -> i32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGenConfig {
    #[serde(default = "default_water")]
    pub water: SeedThresholds,
    #[serde(default = "default_trees")]
    pub trees: SeedThresholds,
    #[serde(default = "default_stone")]
    pub stone: SeedThresholds,
    #[serde(default = "default_coal")]
    pub coal: SeedThresholds,
    #[serde(default = "default_iron")]
    pub iron: SeedThresholds,
    /// Town hall candidates keep this many cells away from the edge.
    #[serde(default = "default_start_inset")]
    pub start_inset: i32,
    /// A candidate needs strictly more open-grass neighbours than this.
    #[serde(default = "default_min_grass_neighbors")]
    pub min_grass_neighbors: usize,
    #[serde(default = "default_first_chance")]
    pub town_hall_first_chance: f64,
    #[serde(default = "default_second_chance")]
    pub town_hall_second_chance: f64,
    #[serde(default = "default_scan_passes")]
    pub town_hall_scan_passes: u32,
    #[serde(default = "default_min_trees")]
    pub min_starting_trees: usize,
    #[serde(default = "default_starting_stone")]
    pub starting_stone: usize,
    #[serde(default = "default_stub_road_length")]
    pub stub_road_length: i32,
    /// Overrides the profile's default.
    #[serde(default)]
    pub stub_roads: Option<bool>,
}

impl MapGenConfig {
    /// Both town hall odds must be probabilities.
    pub fn validate(&self) -> Result<()> {
        for (field, chance) in [
            ("town_hall_first_chance", self.town_hall_first_chance),
            ("town_hall_second_chance", self.town_hall_second_chance),
        ] {
            ensure!(
                (0.0..=1.0).contains(&chance),
                "mapgen.{field} must be within [0, 1], got {chance}"
            );
        }
        Ok(())
    }
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self {
            water: default_water(),
            trees: default_trees(),
            stone: default_stone(),
            coal: default_coal(),
            iron: default_iron(),
            start_inset: default_start_inset(),
            min_grass_neighbors: default_min_grass_neighbors(),
            town_hall_first_chance: default_first_chance(),
            town_hall_second_chance: default_second_chance(),
            town_hall_scan_passes: default_scan_passes(),
            min_starting_trees: default_min_trees(),
            starting_stone: default_starting_stone(),
            stub_road_length: default_stub_road_length(),
            stub_roads: None,
        }
    }
}

fn default_baseline() -> Resources {
    Resources::ZERO
        .with(Channel::Workers, 20)
        .with(Channel::Energy, 30)
        .with(Channel::Food, 60)
}

fn default_food_per_worker() -> i32 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Civic income added after every building has been processed.
    #[serde(default = "default_baseline")]
    pub baseline: Resources,
    #[serde(default = "default_food_per_worker")]
    pub food_per_worker: i32,
    /// Workers and energy are always re-derived; food only when this is set.
    #[serde(default)]
    pub reset_food_each_cycle: bool,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            food_per_worker: default_food_per_worker(),
            reset_food_each_cycle: false,
        }
    }
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("saves")
}

fn default_save_file() -> String {
    "game.json".to_string()
}

fn default_save_interval() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    #[serde(default = "default_save_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_save_file")]
    pub file_name: String,
    /// Autosave every this many days; zero disables autosave.
    #[serde(default = "default_save_interval")]
    pub interval_days: u32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            dir: default_save_dir(),
            file_name: default_save_file(),
            interval_days: default_save_interval(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_name() -> String {
    "settlement".to_string()
}

fn default_seed() -> u64 {
    7
}

fn default_resource_max() -> i32 {
    100_000
}

fn default_starting_inventory() -> Resources {
    Resources::ZERO
        .with(Channel::Gold, 500)
        .with(Channel::Wood, 150)
        .with(Channel::Stone, 50)
        .with(Channel::Food, 100)
}

fn default_day_interval_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub profile: Profile,
    /// Overrides the profile's grid size.
    #[serde(default)]
    pub bounds: Option<i32>,
    #[serde(default = "default_resource_max")]
    pub resource_max: i32,
    #[serde(default = "default_starting_inventory")]
    pub starting_inventory: Resources,
    #[serde(default = "default_day_interval_ms")]
    pub day_interval_ms: u64,
    #[serde(default)]
    pub save: SaveConfig,
    #[serde(default)]
    pub mapgen: MapGenConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Desktop)
    }
}

impl GameConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            name: default_name(),
            seed: default_seed(),
            profile,
            bounds: None,
            resource_max: default_resource_max(),
            starting_inventory: default_starting_inventory(),
            day_interval_ms: default_day_interval_ms(),
            save: SaveConfig::default(),
            mapgen: MapGenConfig::default(),
            economy: EconomyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn bounds(&self) -> i32 {
        self.bounds.unwrap_or_else(|| self.profile.bounds()).max(1)
    }

    pub fn metrics(&self) -> TileMetrics {
        self.profile.metrics()
    }

    pub fn stub_roads(&self) -> bool {
        self.mapgen
            .stub_roads
            .unwrap_or_else(|| self.profile.stub_roads())
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: GameConfig =
            serde_yaml::from_str(text).context("Failed to parse game config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.mapgen.validate()
    }

    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to encode game config")?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<GameConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GameConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = GameConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.bounds(), 75);
        assert!(!config.stub_roads());
        assert_eq!(config.save.interval_days, 10);
        assert_eq!(config.economy.baseline.food, 60);
    }

    #[test]
    fn mobile_profile_is_small_with_stub_roads() {
        let config = GameConfig::from_yaml_str("profile: mobile\nseed: 3\n").unwrap();
        assert_eq!(config.bounds(), 20);
        assert!(config.stub_roads());
        assert_eq!(config.metrics().tile_width, 64.0);
        assert_eq!(config.seed, 3);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = "\
bounds: 30
mapgen:
  start_inset: 4
  stub_roads: true
economy:
  reset_food_each_cycle: true
";
        let config = GameConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.bounds(), 30);
        assert_eq!(config.mapgen.start_inset, 4);
        assert_eq!(config.mapgen.water, default_water());
        assert!(config.stub_roads());
        assert!(config.economy.reset_food_each_cycle);
        assert_eq!(config.economy.food_per_worker, 2);
    }

    #[test]
    fn town_hall_odds_must_be_probabilities() {
        for bad in [".nan", "1.5", "-0.1"] {
            let yaml = format!("mapgen:\n  town_hall_first_chance: {bad}\n");
            assert!(GameConfig::from_yaml_str(&yaml).is_err(), "{bad} accepted");
        }
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.yaml"),
            "mapgen:\n  town_hall_second_chance: .nan\n",
        )
        .unwrap();
        assert!(ConfigLoader::new(dir.path()).load("bad.yaml").is_err());
        assert!(GameConfig::from_yaml_str("mapgen:\n  town_hall_first_chance: 1.0\n").is_ok());
    }

    #[test]
    fn threshold_loosens_with_neighbors() {
        let t = default_trees();
        assert_eq!(t.threshold_for(0), t.isolated);
        assert_eq!(t.threshold_for(1), t.one_neighbor);
        assert_eq!(t.threshold_for(2), t.two_neighbors);
        assert_eq!(t.threshold_for(7), t.crowded);
        assert!(t.isolated > t.one_neighbor && t.two_neighbors > t.crowded);
    }

    #[test]
    fn yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = GameConfig::for_profile(Profile::Mobile);
        config.to_yaml(dir.path().join("mobile.yaml")).unwrap();
        let loaded = ConfigLoader::new(dir.path()).load("mobile.yaml").unwrap();
        assert_eq!(loaded, config);
    }
}
