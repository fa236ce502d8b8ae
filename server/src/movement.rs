use crate::changelog::ChangeLog;
use crate::entity::Player;
use shared::{is_blocked, ChangeRecord, Map};

/// Advances one player by one tick of held movement intent.
///
/// Each axis is tried on its own: the move along an axis is committed only
/// if the hitbox at the candidate position is clear. Holding a diagonal into
/// a wall therefore slides along it instead of stopping dead. The result is
/// clamped into the map's pixel bounds.
///
/// Emits `PlayerMoved` and returns true only when the position changed.
pub fn resolve_movement(player: &mut Player, map: &Map, log: &mut ChangeLog) -> bool {
    if !player.is_alive() {
        return false;
    }

    let (start_x, start_y) = (player.x, player.y);
    let (dir_x, dir_y) = player.intent.axes();
    let speed = player.stats.speed;

    if dir_x != 0.0 {
        let candidate = player.x + dir_x * speed;
        if !is_blocked(candidate, player.y, player.size, map) {
            player.x = candidate;
        }
    }

    if dir_y != 0.0 {
        let candidate = player.y + dir_y * speed;
        if !is_blocked(player.x, candidate, player.size, map) {
            player.y = candidate;
        }
    }

    player.x = player.x.clamp(0.0, (map.pixel_width() - player.size).max(0.0));
    player.y = player.y.clamp(0.0, (map.pixel_height() - player.size).max(0.0));

    if player.x == start_x && player.y == start_y {
        return false;
    }

    log.push(ChangeRecord::PlayerMoved {
        id: player.id,
        x: player.x,
        y: player.y,
    });
    true
}
