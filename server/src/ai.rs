//! Computer-controlled players that fill empty seats.
//!
//! Bots go through the same intent API as remote clients: they set movement
//! axes and queue bomb requests, and the tick resolves them like any other
//! input.

use crate::entity::{EntityStore, Player};
use rand::Rng;
use shared::{Direction, GridPos, Map, TileKind};
use std::collections::HashSet;

/// Bot ids start here so they never collide with connection ids.
pub const BOT_ID_BASE: u32 = 1_000_000;
/// Ticks between two decisions of the same bot.
pub const DECISION_INTERVAL: u64 = 15;
const BOMB_CHANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMove {
    Step(Direction),
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub movement: BotMove,
    pub place_bomb: bool,
}

/// Cells a bot should stay out of: the full cross of every live bomb,
/// ignoring obstacles, plus every cell of an active explosion.
pub fn danger_cells(store: &EntityStore) -> HashSet<GridPos> {
    let mut danger = HashSet::new();
    for bomb in &store.bombs {
        danger.insert(bomb.pos);
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            for step in 1..=bomb.radius as i32 {
                danger.insert(bomb.pos.offset(dx * step, dy * step));
            }
        }
    }
    for explosion in &store.explosions {
        danger.extend(explosion.cells.iter().copied());
    }
    danger
}

/// Moves from the player's cell that land on open, non-dangerous ground.
///
/// Falls back to every option when nothing is safe.
pub fn safe_moves(player: &Player, map: &Map, danger: &HashSet<GridPos>) -> Vec<BotMove> {
    let here = player.cell();
    let mut options: Vec<(BotMove, GridPos)> = Direction::ALL
        .iter()
        .map(|&d| {
            let (dx, dy) = d.delta();
            (BotMove::Step(d), here.offset(dx, dy))
        })
        .collect();
    options.push((BotMove::Stay, here));

    let safe: Vec<BotMove> = options
        .iter()
        .filter(|(_, cell)| map.get(*cell) == Some(TileKind::Empty) && !danger.contains(cell))
        .map(|(m, _)| *m)
        .collect();

    if safe.is_empty() {
        options.into_iter().map(|(m, _)| m).collect()
    } else {
        safe
    }
}

pub fn decide<R: Rng>(player: &Player, map: &Map, store: &EntityStore, rng: &mut R) -> Decision {
    let danger = danger_cells(store);
    let moves = safe_moves(player, map, &danger);
    Decision {
        movement: moves[rng.gen_range(0..moves.len())],
        place_bomb: rng.gen_bool(BOMB_CHANCE),
    }
}

/// Turns a decision into held intent on the bot's player record.
pub fn apply(decision: Decision, id: u32, store: &mut EntityStore) {
    store.clear_intent(id);
    if let BotMove::Step(direction) = decision.movement {
        store.set_intent(id, direction, true);
    }
    if decision.place_bomb {
        store.request_bomb(id);
    }
}
