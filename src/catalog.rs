//! Static building/resource definitions.
//!
//! A [`Catalog`] is built once per session and handed to the generator, the
//! day-cycle systems and the placement rules by reference. It owns the
//! building presets, the harvester link table and the per-resource yields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the eight inventory channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Gold,
    Wood,
    Coal,
    Iron,
    Stone,
    Workers,
    Energy,
    Food,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::Gold,
        Channel::Wood,
        Channel::Coal,
        Channel::Iron,
        Channel::Stone,
        Channel::Workers,
        Channel::Energy,
        Channel::Food,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Gold => "gold",
            Channel::Wood => "wood",
            Channel::Coal => "coal",
            Channel::Iron => "iron",
            Channel::Stone => "stone",
            Channel::Workers => "workers",
            Channel::Energy => "energy",
            Channel::Food => "food",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value per channel. Used for upfront costs, per-cycle costs, per-cycle
/// outputs and the inventory balances alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub gold: i32,
    pub wood: i32,
    pub coal: i32,
    pub iron: i32,
    pub stone: i32,
    pub workers: i32,
    pub energy: i32,
    pub food: i32,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        gold: 0,
        wood: 0,
        coal: 0,
        iron: 0,
        stone: 0,
        workers: 0,
        energy: 0,
        food: 0,
    };

    pub fn get(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Gold => self.gold,
            Channel::Wood => self.wood,
            Channel::Coal => self.coal,
            Channel::Iron => self.iron,
            Channel::Stone => self.stone,
            Channel::Workers => self.workers,
            Channel::Energy => self.energy,
            Channel::Food => self.food,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut i32 {
        match channel {
            Channel::Gold => &mut self.gold,
            Channel::Wood => &mut self.wood,
            Channel::Coal => &mut self.coal,
            Channel::Iron => &mut self.iron,
            Channel::Stone => &mut self.stone,
            Channel::Workers => &mut self.workers,
            Channel::Energy => &mut self.energy,
            Channel::Food => &mut self.food,
        }
    }

    pub fn with(mut self, channel: Channel, amount: i32) -> Self {
        *self.get_mut(channel) = amount;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, i32)> + '_ {
        Channel::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn is_zero(&self) -> bool {
        self.iter().all(|(_, v)| v == 0)
    }

    /// Scales every channel by `numerator / denominator`, rounding toward zero.
    pub fn scaled(&self, numerator: i32, denominator: i32) -> Self {
        let mut out = Resources::ZERO;
        if denominator == 0 {
            return out;
        }
        for (channel, value) in self.iter() {
            *out.get_mut(channel) = value * numerator / denominator;
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    None,
    Resource,
    Building,
}

impl ObjectType {
    pub fn id(self) -> i32 {
        match self {
            ObjectType::None => 0,
            ObjectType::Resource => 1,
            ObjectType::Building => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceCategory {
    Water,
    Tree,
    Ore,
    Farmland,
}

/// Natural resources and other harvestable tile objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Water,
    Tree,
    Stone,
    Coal,
    Iron,
    Farmland,
    Shore,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Water,
        ResourceKind::Tree,
        ResourceKind::Stone,
        ResourceKind::Coal,
        ResourceKind::Iron,
        ResourceKind::Farmland,
        ResourceKind::Shore,
    ];

    pub fn object_id(self) -> i32 {
        match self {
            ResourceKind::Water => 1,
            ResourceKind::Tree => 2,
            ResourceKind::Stone => 3,
            ResourceKind::Coal => 4,
            ResourceKind::Iron => 5,
            ResourceKind::Farmland => 6,
            ResourceKind::Shore => 7,
        }
    }

    pub fn from_object_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.object_id() == id)
    }

    pub fn category(self) -> ResourceCategory {
        match self {
            ResourceKind::Water | ResourceKind::Shore => ResourceCategory::Water,
            ResourceKind::Tree => ResourceCategory::Tree,
            ResourceKind::Stone | ResourceKind::Coal | ResourceKind::Iron => ResourceCategory::Ore,
            ResourceKind::Farmland => ResourceCategory::Farmland,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Water => "Water",
            ResourceKind::Tree => "Tree",
            ResourceKind::Stone => "Stone",
            ResourceKind::Coal => "Coal",
            ResourceKind::Iron => "Iron",
            ResourceKind::Farmland => "Farmland",
            ResourceKind::Shore => "Shore",
        }
    }

    pub fn texture_pool(self) -> &'static [i32] {
        match self {
            ResourceKind::Water => &[40],
            ResourceKind::Shore => &[41],
            ResourceKind::Tree => &[42, 43, 44],
            ResourceKind::Stone => &[45],
            ResourceKind::Coal => &[46],
            ResourceKind::Iron => &[47],
            ResourceKind::Farmland => &[48],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    TownHall,
    Road,
    Farm,
    LogCabin,
    Quarry,
    PowerLine,
    Windmill,
    Watermill,
    LowHouse,
    MedHouse,
    EliteHouse,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 11] = [
        BuildingKind::TownHall,
        BuildingKind::Road,
        BuildingKind::Farm,
        BuildingKind::LogCabin,
        BuildingKind::Quarry,
        BuildingKind::PowerLine,
        BuildingKind::Windmill,
        BuildingKind::Watermill,
        BuildingKind::LowHouse,
        BuildingKind::MedHouse,
        BuildingKind::EliteHouse,
    ];

    pub fn object_id(self) -> i32 {
        match self {
            BuildingKind::TownHall => 1,
            BuildingKind::Road => 2,
            BuildingKind::Farm => 3,
            BuildingKind::LogCabin => 4,
            BuildingKind::Quarry => 5,
            BuildingKind::PowerLine => 6,
            BuildingKind::Windmill => 7,
            BuildingKind::Watermill => 8,
            BuildingKind::LowHouse => 9,
            BuildingKind::MedHouse => 10,
            BuildingKind::EliteHouse => 11,
        }
    }

    pub fn from_object_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.object_id() == id)
    }

    pub fn is_residence(self) -> bool {
        matches!(
            self,
            BuildingKind::LowHouse | BuildingKind::MedHouse | BuildingKind::EliteHouse
        )
    }
}

/// What occupies a tile. `Empty` is the sentinel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectKind {
    #[default]
    Empty,
    Resource(ResourceKind),
    Building(BuildingKind),
}

impl ObjectKind {
    pub fn object_type(self) -> ObjectType {
        match self {
            ObjectKind::Empty => ObjectType::None,
            ObjectKind::Resource(_) => ObjectType::Resource,
            ObjectKind::Building(_) => ObjectType::Building,
        }
    }

    pub fn type_id(self) -> i32 {
        self.object_type().id()
    }

    pub fn object_id(self) -> i32 {
        match self {
            ObjectKind::Empty => 0,
            ObjectKind::Resource(kind) => kind.object_id(),
            ObjectKind::Building(kind) => kind.object_id(),
        }
    }

    pub fn from_ids(type_id: i32, object_id: i32) -> Result<Self, CatalogError> {
        match type_id {
            0 => Ok(ObjectKind::Empty),
            1 => ResourceKind::from_object_id(object_id)
                .map(ObjectKind::Resource)
                .ok_or(CatalogError::UnknownObject { type_id, object_id }),
            2 => BuildingKind::from_object_id(object_id)
                .map(ObjectKind::Building)
                .ok_or(CatalogError::UnknownObject { type_id, object_id }),
            other => Err(CatalogError::UnknownType(other)),
        }
    }

    pub fn resource(self) -> Option<ResourceKind> {
        match self {
            ObjectKind::Resource(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn building(self) -> Option<BuildingKind> {
        match self {
            ObjectKind::Building(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, ObjectKind::Empty)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown object type id {0}")]
    UnknownType(i32),
    #[error("unknown object id {object_id} for type {type_id}")]
    UnknownObject { type_id: i32, object_id: i32 },
}

/// Immutable template copied onto a tile when a building is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingPreset {
    pub kind: BuildingKind,
    pub name: &'static str,
    /// Square radius used for harvesting scans, uniqueness and light.
    pub range: i32,
    pub requires_road: bool,
    pub light_source: bool,
    pub upfront: Resources,
    pub cost: Resources,
    pub output: Resources,
    pub texture_pool: &'static [i32],
}

impl BuildingPreset {
    fn new(kind: BuildingKind, name: &'static str, range: i32) -> Self {
        Self {
            kind,
            name,
            range,
            requires_road: true,
            light_source: false,
            upfront: Resources::ZERO,
            cost: Resources::ZERO,
            output: Resources::ZERO,
            texture_pool: &[0],
        }
    }

    fn textures(mut self, pool: &'static [i32]) -> Self {
        self.texture_pool = pool;
        self
    }

    fn upfront(mut self, channel: Channel, amount: i32) -> Self {
        self.upfront = self.upfront.with(channel, amount);
        self
    }

    fn cost(mut self, channel: Channel, amount: i32) -> Self {
        self.cost = self.cost.with(channel, amount);
        self
    }

    fn output(mut self, channel: Channel, amount: i32) -> Self {
        self.output = self.output.with(channel, amount);
        self
    }

    fn no_road(mut self) -> Self {
        self.requires_road = false;
        self
    }

    fn lit(mut self) -> Self {
        self.light_source = true;
        self
    }
}

/// Per-tile harvest from one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceYield {
    pub channel: Channel,
    pub amount: i32,
    pub display_name: &'static str,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    presets: BTreeMap<BuildingKind, BuildingPreset>,
    links: BTreeMap<BuildingKind, Vec<ResourceKind>>,
    harvesters: BTreeMap<ResourceKind, Vec<BuildingKind>>,
    yields: BTreeMap<ResourceKind, ResourceYield>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    pub fn standard() -> Self {
        use Channel::*;

        let presets = [
            BuildingPreset::new(BuildingKind::TownHall, "Town Hall", 5)
                .textures(&[1])
                .no_road()
                .lit()
                .output(Gold, 10),
            BuildingPreset::new(BuildingKind::Road, "Road", 0)
                .textures(&[20])
                .no_road()
                .upfront(Gold, 5),
            BuildingPreset::new(BuildingKind::Farm, "Farm", 1)
                .textures(&[2])
                .upfront(Gold, 50)
                .upfront(Wood, 20)
                .cost(Workers, 5)
                .output(Food, 10),
            BuildingPreset::new(BuildingKind::LogCabin, "Log Cabin", 3)
                .textures(&[3])
                .upfront(Gold, 40)
                .cost(Workers, 3),
            BuildingPreset::new(BuildingKind::Quarry, "Quarry", 3)
                .textures(&[4])
                .upfront(Gold, 60)
                .upfront(Wood, 30)
                .cost(Workers, 5)
                .cost(Energy, 5),
            BuildingPreset::new(BuildingKind::PowerLine, "Power Line", 4)
                .textures(&[5])
                .no_road()
                .lit()
                .upfront(Gold, 20)
                .upfront(Wood, 10)
                .cost(Energy, 2),
            BuildingPreset::new(BuildingKind::Windmill, "Windmill", 1)
                .textures(&[6])
                .upfront(Gold, 80)
                .upfront(Wood, 40)
                .upfront(Stone, 20)
                .cost(Workers, 2)
                .output(Energy, 15),
            BuildingPreset::new(BuildingKind::Watermill, "Watermill", 1)
                .textures(&[7])
                .upfront(Gold, 100)
                .upfront(Wood, 40)
                .upfront(Stone, 40)
                .cost(Workers, 2)
                .output(Energy, 25),
            BuildingPreset::new(BuildingKind::LowHouse, "Low House", 1)
                .textures(&[10, 11, 12])
                .upfront(Gold, 30)
                .upfront(Wood, 20)
                .output(Workers, 4)
                .output(Gold, 2),
            BuildingPreset::new(BuildingKind::MedHouse, "Medium House", 1)
                .textures(&[13, 14])
                .upfront(Gold, 80)
                .upfront(Wood, 40)
                .upfront(Stone, 20)
                .cost(Energy, 2)
                .output(Workers, 8)
                .output(Gold, 5),
            BuildingPreset::new(BuildingKind::EliteHouse, "Elite House", 1)
                .textures(&[15, 16])
                .upfront(Gold, 200)
                .upfront(Wood, 60)
                .upfront(Stone, 60)
                .upfront(Iron, 10)
                .cost(Energy, 5)
                .output(Workers, 12)
                .output(Gold, 15),
        ];

        let links = [
            (BuildingKind::LogCabin, vec![ResourceKind::Tree]),
            (
                BuildingKind::Quarry,
                vec![ResourceKind::Stone, ResourceKind::Coal, ResourceKind::Iron],
            ),
            (BuildingKind::Farm, vec![ResourceKind::Farmland]),
        ];

        let yields = [
            (ResourceKind::Tree, Wood, 2),
            (ResourceKind::Stone, Stone, 2),
            (ResourceKind::Coal, Coal, 1),
            (ResourceKind::Iron, Iron, 1),
            (ResourceKind::Farmland, Food, 5),
        ];

        let mut catalog = Self {
            presets: presets.into_iter().map(|p| (p.kind, p)).collect(),
            links: links.into_iter().collect(),
            harvesters: BTreeMap::new(),
            yields: yields
                .into_iter()
                .map(|(kind, channel, amount)| {
                    (
                        kind,
                        ResourceYield {
                            channel,
                            amount,
                            display_name: kind.name(),
                        },
                    )
                })
                .collect(),
        };
        catalog.rebuild_reverse_links();
        catalog
    }

    /// Replaces one preset. Used to rebalance a session without touching the
    /// shared defaults.
    pub fn with_preset(mut self, preset: BuildingPreset) -> Self {
        self.presets.insert(preset.kind, preset);
        self
    }

    fn rebuild_reverse_links(&mut self) {
        self.harvesters.clear();
        for (building, resources) in &self.links {
            for resource in resources {
                self.harvesters.entry(*resource).or_default().push(*building);
            }
        }
    }

    pub fn preset(&self, kind: BuildingKind) -> &BuildingPreset {
        // Every BuildingKind is inserted by `standard` and `with_preset` only replaces.
        &self.presets[&kind]
    }

    pub fn presets(&self) -> impl Iterator<Item = &BuildingPreset> {
        self.presets.values()
    }

    pub fn linked_resources(&self, kind: BuildingKind) -> Option<&[ResourceKind]> {
        self.links.get(&kind).map(Vec::as_slice)
    }

    pub fn is_harvester(&self, kind: BuildingKind) -> bool {
        self.links.contains_key(&kind)
    }

    pub fn harvesters_of(&self, resource: ResourceKind) -> &[BuildingKind] {
        self.harvesters
            .get(&resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn yield_for(&self, resource: ResourceKind) -> Option<&ResourceYield> {
        self.yields.get(&resource)
    }

    /// Range of the object on a tile; resources and the empty object have none.
    pub fn range_of(&self, kind: ObjectKind) -> i32 {
        kind.building().map_or(0, |b| self.preset(b).range)
    }
}
