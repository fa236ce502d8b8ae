use rand::Rng;
use shared::{GridPos, Map, TileKind};

/// Returns true for cells inside one of the four 2x2 spawn corners.
pub fn is_spawn_zone(pos: GridPos, cols: usize, rows: usize) -> bool {
    let (cols, rows) = (cols as i32, rows as i32);
    let near_x = pos.x < 2 || pos.x >= cols - 2;
    let near_y = pos.y < 2 || pos.y >= rows - 2;
    near_x && near_y
}

/// Builds a fresh arena.
///
/// Walls go on every odd/odd cell, giving the classic pillar lattice. The
/// remaining cells become Blocks with probability `block_density`, except the
/// spawn corners which always stay Empty. The grid edge itself acts as the
/// outer boundary.
pub fn generate<R: Rng>(cols: usize, rows: usize, block_density: f64, rng: &mut R) -> Map {
    let mut map = Map::filled(cols, rows, TileKind::Empty);
    let density = block_density.clamp(0.0, 1.0);

    for y in 0..rows as i32 {
        for x in 0..cols as i32 {
            let pos = GridPos::new(x, y);
            if is_spawn_zone(pos, cols, rows) {
                continue;
            }
            let tile = if x % 2 == 1 && y % 2 == 1 {
                TileKind::Wall
            } else if rng.gen_bool(density) {
                TileKind::Block
            } else {
                TileKind::Empty
            };
            map.set(pos, tile);
        }
    }

    map
}
