//! The tile grid and per-tile queries.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::catalog::{
    BuildingKind, BuildingPreset, Catalog, ObjectKind, ObjectType, ResourceCategory, ResourceKind,
    Resources,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Left, right, up, down. The order matches [`Grid::nearby_roads`].
    pub fn neighbors4(self) -> [TilePos; 4] {
        [
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, -1),
            self.offset(0, 1),
        ]
    }

    pub fn neighbors8(self) -> [TilePos; 8] {
        [
            self.offset(-1, -1),
            self.offset(0, -1),
            self.offset(1, -1),
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(-1, 1),
            self.offset(0, 1),
            self.offset(1, 1),
        ]
    }

    pub fn chebyshev(self, other: TilePos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Grass,
    Stone,
    Water,
}

impl Terrain {
    pub fn id(self) -> i32 {
        match self {
            Terrain::Grass => 0,
            Terrain::Stone => 1,
            Terrain::Water => 2,
        }
    }

    /// Unknown ids fall back to grass.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => Terrain::Stone,
            2 => Terrain::Water,
            _ => Terrain::Grass,
        }
    }
}

/// Screen-space size of one isometric tile step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileMetrics {
    pub tile_width: f32,
    pub tile_height: f32,
}

impl TileMetrics {
    pub fn iso_position(&self, pos: TilePos) -> Vec2 {
        Vec2 {
            x: pos.x as f32 * self.tile_width - pos.y as f32 * self.tile_width,
            y: pos.x as f32 * self.tile_height + pos.y as f32 * self.tile_height,
        }
    }
}

impl Default for TileMetrics {
    fn default() -> Self {
        Self {
            tile_width: 32.0,
            tile_height: 16.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resident {
    pub name: String,
    pub days_alive: u32,
    pub education: u8,
    pub health: u8,
    pub happiness: u8,
}

impl Resident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            days_alive: 0,
            education: 0,
            health: 100,
            happiness: 50,
        }
    }
}

/// The building or resource on a tile, or the empty sentinel.
///
/// `cost` and `output` are the live per-cycle values; harvesters have their
/// output recomputed from the preset every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileObject {
    pub id: u32,
    pub kind: ObjectKind,
    pub texture_index: i32,
    pub upfront: Resources,
    pub cost: Resources,
    pub output: Resources,
    pub residents: Vec<Resident>,
}

impl TileObject {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_preset(id: u32, preset: &BuildingPreset, texture_index: i32) -> Self {
        Self {
            id,
            kind: ObjectKind::Building(preset.kind),
            texture_index,
            upfront: preset.upfront,
            cost: preset.cost,
            output: preset.output,
            residents: Vec::new(),
        }
    }

    /// Natural resources carry only outputs.
    pub fn resource(id: u32, kind: ResourceKind, texture_index: i32, catalog: &Catalog) -> Self {
        let output = catalog
            .yield_for(kind)
            .map(|y| Resources::ZERO.with(y.channel, y.amount))
            .unwrap_or_default();
        Self {
            id,
            kind: ObjectKind::Resource(kind),
            texture_index,
            upfront: Resources::ZERO,
            cost: Resources::ZERO,
            output,
            residents: Vec::new(),
        }
    }

    pub fn type_id(&self) -> i32 {
        self.kind.type_id()
    }

    pub fn object_id(&self) -> i32 {
        self.kind.object_id()
    }

    pub fn is_empty(&self) -> bool {
        self.object_id() <= 0
    }

    pub fn building(&self) -> Option<BuildingKind> {
        self.kind.building()
    }

    pub fn resource_kind(&self) -> Option<ResourceKind> {
        self.kind.resource()
    }

    pub fn is_building(&self, kind: BuildingKind) -> bool {
        self.building() == Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub pos: TilePos,
    pub position: Vec2,
    pub terrain: Terrain,
    pub object: TileObject,
    pub is_visible: bool,
    /// Presentation-only flags, never persisted.
    pub is_glowing: bool,
    pub is_previewing_road: bool,
    pub destroyed_fx: bool,
}

impl Tile {
    pub fn is_water(&self) -> bool {
        self.terrain == Terrain::Water
            || self
                .object
                .resource_kind()
                .is_some_and(|r| r.category() == ResourceCategory::Water)
    }

    /// Grass terrain with nothing on it.
    pub fn is_open_grass(&self) -> bool {
        self.terrain == Terrain::Grass && self.object.is_empty()
    }

    pub fn is_road(&self) -> bool {
        self.object.is_building(BuildingKind::Road)
    }
}

/// Road texture chosen from the four orthogonal neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadShape {
    Horizontal,
    Vertical,
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
    TeeNoLeft,
    TeeNoRight,
    TeeNoUp,
    TeeNoDown,
    Cross,
}

impl RoadShape {
    /// `neighbors` is `[left, right, up, down]`.
    pub fn from_neighbors(neighbors: [bool; 4]) -> Self {
        let [left, right, up, down] = neighbors;
        match neighbors.iter().filter(|n| **n).count() {
            4 => RoadShape::Cross,
            3 => {
                if !left {
                    RoadShape::TeeNoLeft
                } else if !right {
                    RoadShape::TeeNoRight
                } else if !up {
                    RoadShape::TeeNoUp
                } else {
                    RoadShape::TeeNoDown
                }
            }
            2 => match (left, right, up, down) {
                (true, _, true, _) => RoadShape::LeftUp,
                (true, _, _, true) => RoadShape::LeftDown,
                (_, true, true, _) => RoadShape::RightUp,
                (_, true, _, true) => RoadShape::RightDown,
                (true, true, _, _) => RoadShape::Horizontal,
                _ => RoadShape::Vertical,
            },
            _ => {
                if up || down {
                    RoadShape::Vertical
                } else {
                    RoadShape::Horizontal
                }
            }
        }
    }

    pub fn texture_id(self) -> i32 {
        match self {
            RoadShape::Horizontal => 20,
            RoadShape::Vertical => 21,
            RoadShape::LeftUp => 22,
            RoadShape::LeftDown => 23,
            RoadShape::RightUp => 24,
            RoadShape::RightDown => 25,
            RoadShape::TeeNoLeft => 26,
            RoadShape::TeeNoRight => 27,
            RoadShape::TeeNoUp => 28,
            RoadShape::TeeNoDown => 29,
            RoadShape::Cross => 30,
        }
    }
}

pub fn decide_road_texture_id(neighbors: [bool; 4]) -> i32 {
    RoadShape::from_neighbors(neighbors).texture_id()
}

/// Square `bounds x bounds` grid stored x-major so that iteration order is
/// x-then-y.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    bounds: i32,
    tiles: Vec<Tile>,
    next_object_id: u32,
}

impl Grid {
    pub fn new(bounds: i32, metrics: TileMetrics) -> Self {
        let bounds = bounds.max(1);
        let mut tiles = Vec::with_capacity((bounds * bounds) as usize);
        for x in 0..bounds {
            for y in 0..bounds {
                let pos = TilePos::new(x, y);
                tiles.push(Tile {
                    pos,
                    position: metrics.iso_position(pos),
                    terrain: Terrain::Grass,
                    object: TileObject::empty(),
                    is_visible: false,
                    is_glowing: false,
                    is_previewing_road: false,
                    destroyed_fx: false,
                });
            }
        }
        Self {
            bounds,
            tiles,
            next_object_id: 1,
        }
    }

    /// Rebuilds a grid from restored tiles. Callers check that every cell
    /// appears exactly once; cells that do not appear are left blank.
    pub fn from_tiles(bounds: i32, metrics: TileMetrics, restored: Vec<Tile>) -> Self {
        let mut grid = Self::new(bounds, metrics);
        for tile in restored {
            if let Some(index) = grid.index(tile.pos) {
                grid.next_object_id = grid.next_object_id.max(tile.object.id + 1);
                grid.tiles[index] = tile;
            }
        }
        grid
    }

    pub fn bounds(&self) -> i32 {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.bounds && pos.y < self.bounds
    }

    pub fn index(&self, pos: TilePos) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.x * self.bounds + pos.y) as usize)
    }

    pub fn pos_of(&self, index: usize) -> Option<TilePos> {
        (index < self.tiles.len()).then(|| {
            let index = index as i32;
            TilePos::new(index / self.bounds, index % self.bounds)
        })
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index(pos).map(move |i| &mut self.tiles[i])
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// All positions in x-then-y order.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> {
        let bounds = self.bounds;
        (0..bounds).flat_map(move |x| (0..bounds).map(move |y| TilePos::new(x, y)))
    }

    pub fn allocate_object_id(&mut self) -> u32 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    /// Every in-bounds position within `range` of `center` (square radius),
    /// excluding `center`, in x-then-y order.
    pub fn within_range(&self, center: TilePos, range: i32) -> Vec<TilePos> {
        let range = range.max(0);
        let x0 = (center.x - range).max(0);
        let x1 = (center.x + range).min(self.bounds - 1);
        let y0 = (center.y - range).max(0);
        let y1 = (center.y + range).min(self.bounds - 1);
        let mut out = Vec::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                let pos = TilePos::new(x, y);
                if pos != center {
                    out.push(pos);
                }
            }
        }
        out
    }

    pub fn count_within(
        &self,
        center: TilePos,
        range: i32,
        mut predicate: impl FnMut(&Tile) -> bool,
    ) -> usize {
        self.within_range(center, range)
            .into_iter()
            .filter_map(|pos| self.get(pos))
            .filter(|tile| predicate(tile))
            .count()
    }

    pub fn neighbors4(&self, pos: TilePos) -> impl Iterator<Item = &Tile> {
        pos.neighbors4().into_iter().filter_map(move |p| self.get(p))
    }

    pub fn neighbors8(&self, pos: TilePos) -> impl Iterator<Item = &Tile> {
        pos.neighbors8().into_iter().filter_map(move |p| self.get(p))
    }

    /// Road or road preview.
    pub fn is_road_like(&self, pos: TilePos) -> bool {
        self.get(pos)
            .is_some_and(|tile| tile.is_road() || tile.is_previewing_road)
    }

    /// `[left, right, up, down]`; out-of-bounds neighbours are `false`.
    pub fn nearby_roads(&self, pos: TilePos) -> [bool; 4] {
        pos.neighbors4().map(|p| self.is_road_like(p))
    }

    pub fn has_adjacent_road(&self, pos: TilePos) -> bool {
        self.nearby_roads(pos).iter().any(|r| *r)
    }

    pub fn road_texture_for(&self, pos: TilePos) -> i32 {
        decide_road_texture_id(self.nearby_roads(pos))
    }

    /// Re-derives the texture of every road at `pos` and its four neighbours.
    pub fn refresh_road_textures(&mut self, pos: TilePos) {
        let mut targets = vec![pos];
        targets.extend(pos.neighbors4());
        for target in targets {
            let texture = self.road_texture_for(target);
            if let Some(tile) = self.get_mut(target) {
                if tile.is_road() {
                    tile.object.texture_index = texture;
                }
            }
        }
    }

    pub fn refresh_all_road_textures(&mut self) {
        let roads: Vec<TilePos> = self
            .tiles
            .iter()
            .filter(|t| t.is_road())
            .map(|t| t.pos)
            .collect();
        for pos in roads {
            let texture = self.road_texture_for(pos);
            if let Some(tile) = self.get_mut(pos) {
                tile.object.texture_index = texture;
            }
        }
    }

    /// Replaces the object on a tile, returning the previous one.
    pub fn set_object(&mut self, pos: TilePos, object: TileObject) -> Option<TileObject> {
        let tile = self.get_mut(pos)?;
        Some(std::mem::replace(&mut tile.object, object))
    }

    pub fn clear_object(&mut self, pos: TilePos) -> Option<TileObject> {
        self.set_object(pos, TileObject::empty())
    }

    /// Marks `center` and every tile within `range` visible.
    pub fn reveal(&mut self, center: TilePos, range: i32) {
        if let Some(tile) = self.get_mut(center) {
            tile.is_visible = true;
        }
        for pos in self.within_range(center, range) {
            if let Some(tile) = self.get_mut(pos) {
                tile.is_visible = true;
            }
        }
    }

    pub fn clear_visibility(&mut self) {
        for tile in &mut self.tiles {
            tile.is_visible = false;
        }
    }

    pub fn clear_glow(&mut self) {
        for tile in &mut self.tiles {
            tile.is_glowing = false;
        }
    }

    pub fn clear_road_previews(&mut self) {
        for tile in &mut self.tiles {
            tile.is_previewing_road = false;
        }
    }

    pub fn count_buildings(&self, kind: BuildingKind) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.object.is_building(kind))
            .count()
    }

    pub fn find_building(&self, kind: BuildingKind) -> Option<TilePos> {
        self.tiles
            .iter()
            .find(|t| t.object.is_building(kind))
            .map(|t| t.pos)
    }

    /// One character per tile, one row per y. Hidden tiles are lowercase
    /// where that distinction exists.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.bounds * (self.bounds + 1)) as usize);
        for y in 0..self.bounds {
            for x in 0..self.bounds {
                let Some(tile) = self.get(TilePos::new(x, y)) else {
                    continue;
                };
                let glyph = match tile.object.kind {
                    ObjectKind::Empty => match tile.terrain {
                        Terrain::Water => '~',
                        Terrain::Stone => ':',
                        Terrain::Grass => '.',
                    },
                    ObjectKind::Resource(kind) => match kind {
                        ResourceKind::Water | ResourceKind::Shore => '~',
                        ResourceKind::Tree => 't',
                        ResourceKind::Stone => 's',
                        ResourceKind::Coal => 'c',
                        ResourceKind::Iron => 'i',
                        ResourceKind::Farmland => 'f',
                    },
                    ObjectKind::Building(kind) => match kind {
                        BuildingKind::TownHall => 'H',
                        BuildingKind::Road => '#',
                        BuildingKind::Farm => 'F',
                        BuildingKind::LogCabin => 'L',
                        BuildingKind::Quarry => 'Q',
                        BuildingKind::PowerLine => 'P',
                        BuildingKind::Windmill => 'W',
                        BuildingKind::Watermill => 'M',
                        BuildingKind::LowHouse => '1',
                        BuildingKind::MedHouse => '2',
                        BuildingKind::EliteHouse => '3',
                    },
                };
                out.push(glyph);
            }
            let _ = writeln!(out);
        }
        out
    }

    /// `type_id == 0` exactly when `object_id <= 0`, for every tile.
    pub fn occupancy_consistent(&self) -> bool {
        self.tiles.iter().all(|t| {
            (t.object.type_id() == ObjectType::None.id()) == (t.object.object_id() <= 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(bounds: i32) -> Grid {
        Grid::new(bounds, TileMetrics::default())
    }

    fn put_road(grid: &mut Grid, catalog: &Catalog, pos: TilePos) {
        let id = grid.allocate_object_id();
        let preset = catalog.preset(BuildingKind::Road);
        grid.set_object(pos, TileObject::from_preset(id, preset, 20));
        grid.refresh_road_textures(pos);
    }

    #[test]
    fn iso_positions_follow_the_diamond_layout() {
        let metrics = TileMetrics {
            tile_width: 32.0,
            tile_height: 16.0,
        };
        let g = Grid::new(4, metrics);
        let tile = g.get(TilePos::new(2, 1)).unwrap();
        assert_eq!(tile.position, Vec2 { x: 32.0, y: 48.0 });
    }

    #[test]
    fn out_of_bounds_lookups_return_none() {
        let g = grid(5);
        assert!(g.get(TilePos::new(-1, 0)).is_none());
        assert!(g.get(TilePos::new(5, 0)).is_none());
        assert!(g.get(TilePos::new(4, 4)).is_some());
        assert_eq!(g.nearby_roads(TilePos::new(0, 0)), [false; 4]);
    }

    #[test]
    fn positions_iterate_x_then_y() {
        let g = grid(3);
        let order: Vec<_> = g.positions().take(4).collect();
        assert_eq!(
            order,
            vec![
                TilePos::new(0, 0),
                TilePos::new(0, 1),
                TilePos::new(0, 2),
                TilePos::new(1, 0)
            ]
        );
        assert_eq!(g.pos_of(4), Some(TilePos::new(1, 1)));
    }

    #[test]
    fn within_range_is_clamped_and_excludes_center() {
        let g = grid(10);
        let corner = g.within_range(TilePos::new(0, 0), 2);
        assert_eq!(corner.len(), 8);
        assert!(!corner.contains(&TilePos::new(0, 0)));
        let middle = g.within_range(TilePos::new(5, 5), 1);
        assert_eq!(middle.len(), 8);
    }

    #[test]
    fn road_truth_table() {
        use RoadShape::*;
        let cases = [
            ([false, false, false, false], Horizontal),
            ([true, false, false, false], Horizontal),
            ([false, true, false, false], Horizontal),
            ([false, false, true, false], Vertical),
            ([false, false, false, true], Vertical),
            ([true, true, false, false], Horizontal),
            ([false, false, true, true], Vertical),
            ([true, false, true, false], LeftUp),
            ([true, false, false, true], LeftDown),
            ([false, true, true, false], RightUp),
            ([false, true, false, true], RightDown),
            ([false, true, true, true], TeeNoLeft),
            ([true, false, true, true], TeeNoRight),
            ([true, true, false, true], TeeNoUp),
            ([true, true, true, false], TeeNoDown),
            ([true, true, true, true], Cross),
        ];
        for (neighbors, expected) in cases {
            assert_eq!(RoadShape::from_neighbors(neighbors), expected, "{neighbors:?}");
        }
    }

    #[test]
    fn straight_road_is_horizontal_in_any_build_order() {
        let catalog = Catalog::standard();
        let center = TilePos::new(3, 3);
        let orders = [
            [TilePos::new(2, 3), center, TilePos::new(4, 3)],
            [TilePos::new(4, 3), TilePos::new(2, 3), center],
            [center, TilePos::new(4, 3), TilePos::new(2, 3)],
        ];
        for order in orders {
            let mut g = grid(7);
            for pos in order {
                put_road(&mut g, &catalog, pos);
            }
            let tile = g.get(center).unwrap();
            assert_eq!(tile.object.texture_index, RoadShape::Horizontal.texture_id());
        }
    }

    #[test]
    fn previews_count_as_roads() {
        let catalog = Catalog::standard();
        let mut g = grid(5);
        let center = TilePos::new(2, 2);
        put_road(&mut g, &catalog, center);
        g.get_mut(TilePos::new(2, 1)).unwrap().is_previewing_road = true;
        g.refresh_road_textures(TilePos::new(2, 1));
        assert_eq!(
            g.get(center).unwrap().object.texture_index,
            RoadShape::Vertical.texture_id()
        );
        g.clear_road_previews();
        assert!(!g.has_adjacent_road(TilePos::new(2, 0)));
    }

    #[test]
    fn reveal_includes_center() {
        let mut g = grid(6);
        g.reveal(TilePos::new(0, 0), 1);
        let visible: Vec<_> = g.tiles().filter(|t| t.is_visible).map(|t| t.pos).collect();
        assert_eq!(visible.len(), 4);
        g.clear_visibility();
        assert!(g.tiles().all(|t| !t.is_visible));
    }

    #[test]
    fn from_tiles_keeps_object_ids_unique() {
        let catalog = Catalog::standard();
        let mut g = grid(4);
        put_road(&mut g, &catalog, TilePos::new(1, 1));
        put_road(&mut g, &catalog, TilePos::new(1, 2));
        let tiles: Vec<Tile> = g.tiles().cloned().collect();
        let mut restored = Grid::from_tiles(4, TileMetrics::default(), tiles);
        assert_eq!(restored.allocate_object_id(), 3);
    }
}
