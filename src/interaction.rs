//! Pointer edges to tile events, and tile events to world commands.

use crate::{catalog::BuildingKind, grid::TilePos};

/// Pointer state sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerState {
    pub tile: Option<TilePos>,
    pub left_down: bool,
    pub right_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEventKind {
    /// Left button released over the tile.
    Click,
    /// Right button released over the tile.
    RightClick,
    /// Left button went down over the tile this frame.
    Pressed,
    /// Left button held over the tile.
    Pressing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileEvent {
    pub pos: TilePos,
    pub kind: TileEventKind,
}

/// Edge detector. Each call compares the new sample with the previous one,
/// so every event fires at most once per tile per frame.
#[derive(Debug, Default)]
pub struct InputTranslator {
    previous: PointerState,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, current: PointerState) -> Vec<TileEvent> {
        let prev = std::mem::replace(&mut self.previous, current);
        let Some(pos) = current.tile else {
            return Vec::new();
        };
        let mut events = Vec::with_capacity(2);
        if current.left_down && !prev.left_down {
            events.push(TileEvent {
                pos,
                kind: TileEventKind::Pressed,
            });
        }
        if current.left_down && prev.left_down {
            events.push(TileEvent {
                pos,
                kind: TileEventKind::Pressing,
            });
        }
        if !current.left_down && prev.left_down {
            events.push(TileEvent {
                pos,
                kind: TileEventKind::Click,
            });
        }
        if !current.right_down && prev.right_down {
            events.push(TileEvent {
                pos,
                kind: TileEventKind::RightClick,
            });
        }
        events
    }
}

/// State changes requested by the player. Each is applied atomically by
/// whoever owns the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PlaceBuilding { pos: TilePos, kind: BuildingKind },
    DeleteBuilding(TilePos),
    SelectTile(TilePos),
    HoverTile(Option<TilePos>),
    SetSelectedObject(Option<BuildingKind>),
    /// Replaces the road preview; an empty path clears it.
    PreviewRoad(Vec<TilePos>),
    BuildRoad(Vec<TilePos>),
}

/// Straight along x first, then along y, both ends included.
pub fn road_path(from: TilePos, to: TilePos) -> Vec<TilePos> {
    let mut path = Vec::new();
    let step_x = (to.x - from.x).signum();
    let step_y = (to.y - from.y).signum();
    let mut cursor = from;
    path.push(cursor);
    while cursor.x != to.x {
        cursor = cursor.offset(step_x, 0);
        path.push(cursor);
    }
    while cursor.y != to.y {
        cursor = cursor.offset(0, step_y);
        path.push(cursor);
    }
    path
}

/// Maps tile events onto commands given what the build menu has selected.
#[derive(Debug, Default)]
pub struct TileController {
    translator: InputTranslator,
    hovered: Option<TilePos>,
    drag_origin: Option<TilePos>,
    drag_end: Option<TilePos>,
}

impl TileController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn frame(&mut self, pointer: PointerState, selected: Option<BuildingKind>) -> Vec<Command> {
        let mut commands = Vec::new();
        if pointer.tile != self.hovered {
            self.hovered = pointer.tile;
            commands.push(Command::HoverTile(pointer.tile));
        }

        let dragging_road = selected == Some(BuildingKind::Road);
        let events = self.translator.update(pointer);
        for event in &events {
            match event.kind {
                TileEventKind::Pressed if dragging_road => {
                    self.drag_origin = Some(event.pos);
                    self.drag_end = Some(event.pos);
                    commands.push(Command::PreviewRoad(vec![event.pos]));
                }
                TileEventKind::Pressing => {
                    if let Some(origin) = self.drag_origin {
                        if self.drag_end != Some(event.pos) {
                            self.drag_end = Some(event.pos);
                            commands.push(Command::PreviewRoad(road_path(origin, event.pos)));
                        }
                    }
                }
                TileEventKind::Click => match self.drag_origin.take() {
                    Some(origin) if dragging_road => {
                        self.drag_end = None;
                        commands.push(Command::PreviewRoad(Vec::new()));
                        commands.push(Command::BuildRoad(road_path(origin, event.pos)));
                    }
                    _ => {
                        self.drag_end = None;
                        commands.push(match selected {
                            Some(kind) => Command::PlaceBuilding {
                                pos: event.pos,
                                kind,
                            },
                            None => Command::SelectTile(event.pos),
                        });
                    }
                },
                TileEventKind::RightClick => commands.push(Command::DeleteBuilding(event.pos)),
                TileEventKind::Pressed => {}
            }
        }

        // released off the map
        if !pointer.left_down && pointer.tile.is_none() && self.drag_origin.take().is_some() {
            self.drag_end = None;
            commands.push(Command::PreviewRoad(Vec::new()));
        }
        commands
    }
}
