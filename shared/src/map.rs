use serde::{Deserialize, Serialize};

/// Edge length of one grid cell in pixels.
pub const CELL_SIZE: f32 = 50.0;
/// Default grid width in cells.
pub const MAP_COLS: usize = 15;
/// Default grid height in cells.
pub const MAP_ROWS: usize = 13;
/// Edge length of every player's square hitbox in pixels.
pub const PLAYER_SIZE: f32 = 40.0;

// Far edges of a box are sampled just inside it, so a box resting flush
// against a cell boundary does not register the neighbouring cell.
const EDGE_INSET: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Empty,
    /// Destructible by blasts.
    Block,
    /// Indestructible.
    Wall,
}

impl TileKind {
    pub fn is_solid(self) -> bool {
        !matches!(self, TileKind::Empty)
    }
}

/// Integer cell coordinate. Signed so blast rays can step off the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Fixed-size rectangular tile grid, stored row-major.
///
/// The dimensions never change after construction; only individual tiles
/// are rewritten (blocks turning into empty ground).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
}

impl Map {
    /// Creates a map of `width` x `height` cells, every one set to `tile`.
    pub fn filled(width: usize, height: usize, tile: TileKind) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * CELL_SIZE
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * CELL_SIZE
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.y as usize * self.width + pos.x as usize)
        } else {
            None
        }
    }

    /// Returns the tile at `pos`, or `None` outside the grid.
    pub fn get(&self, pos: GridPos) -> Option<TileKind> {
        self.index(pos).map(|i| self.tiles[i])
    }

    /// Overwrites the tile at `pos`. Returns false if `pos` is off the grid.
    pub fn set(&mut self, pos: GridPos, tile: TileKind) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Iterates every cell with its coordinate in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (GridPos, TileKind)> + '_ {
        self.tiles.iter().enumerate().map(move |(i, tile)| {
            let pos = GridPos::new((i % self.width) as i32, (i / self.width) as i32);
            (pos, *tile)
        })
    }

    pub fn count(&self, tile: TileKind) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }
}

/// Converts one pixel coordinate into a cell index along the same axis.
pub fn cell_of(px: f32) -> i32 {
    (px / CELL_SIZE).floor() as i32
}

pub fn cell_of_point(x: f32, y: f32) -> GridPos {
    GridPos::new(cell_of(x), cell_of(y))
}

/// Tests whether a square box at `(x, y)` with edge `size` touches anything solid.
///
/// Samples the four corners and the four edge midpoints. A sample outside
/// the grid, or on a Wall or Block, reports the box as blocked.
pub fn is_blocked(x: f32, y: f32, size: f32, map: &Map) -> bool {
    let far = size - EDGE_INSET;
    let mid = size / 2.0;
    let samples = [
        (x, y),
        (x + far, y),
        (x, y + far),
        (x + far, y + far),
        (x + mid, y),
        (x + mid, y + far),
        (x, y + mid),
        (x + far, y + mid),
    ];

    samples.iter().any(|&(sx, sy)| {
        if sx < 0.0 || sy < 0.0 {
            return true;
        }
        match map.get(cell_of_point(sx, sy)) {
            Some(tile) => tile.is_solid(),
            None => true,
        }
    })
}
