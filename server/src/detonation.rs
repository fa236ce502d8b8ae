//! Bomb fuses, blast propagation and everything a blast touches.
//!
//! A bomb goes `armed -> ready -> removed`. All ready bombs of a tick are
//! resolved together in a fix-point loop: a blast ray crossing an armed bomb
//! sets its fuse to zero, and the loop keeps going until no unresolved ready
//! bomb is left. Terrain is read as it stood at the start of the pass and
//! only rewritten afterwards, so the outcome does not depend on the order in
//! which simultaneous bombs are visited.

use crate::changelog::ChangeLog;
use crate::config::GameRules;
use crate::entity::{Bomb, EntityStore, Explosion};
use log::trace;
use rand::Rng;
use shared::{ChangeRecord, Direction, GridPos, Map, PowerUpKind, TileKind};
use std::collections::BTreeSet;

/// What a detonation pass did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DetonationReport {
    pub detonated: usize,
    /// Every cell covered by at least one blast, deduplicated.
    pub hazard: BTreeSet<GridPos>,
    pub destroyed_blocks: Vec<GridPos>,
    pub damaged: Vec<u32>,
    pub killed: Vec<u32>,
}

/// Burns every fuse down by one tick.
pub fn tick_fuses(bombs: &mut [Bomb], dt: f32) {
    for bomb in bombs {
        bomb.fuse -= dt;
    }
}

/// Resolves all ready bombs, including any they chain-ignite.
///
/// `next_explosion_id` is advanced when a new explosion is created.
pub fn resolve_detonations<R: Rng>(
    store: &mut EntityStore,
    map: &mut Map,
    rules: &GameRules,
    rng: &mut R,
    next_explosion_id: &mut u32,
    log: &mut ChangeLog,
) -> DetonationReport {
    let mut report = DetonationReport::default();
    let mut destroyed = BTreeSet::new();
    let mut resolved = vec![false; store.bombs.len()];

    loop {
        let ready: Vec<usize> = (0..store.bombs.len())
            .filter(|&i| !resolved[i] && store.bombs[i].is_ready())
            .collect();
        if ready.is_empty() {
            break;
        }

        for i in ready {
            resolved[i] = true;
            report.detonated += 1;
            let Bomb {
                owner, pos, radius, ..
            } = store.bombs[i];

            log.push(ChangeRecord::BombExploded { owner, pos });
            report.hazard.insert(pos);

            for direction in Direction::ALL {
                trace_ray(
                    pos,
                    direction,
                    radius,
                    map,
                    &mut store.bombs,
                    &mut report.hazard,
                    &mut destroyed,
                );
            }
        }
    }

    if report.hazard.is_empty() {
        return report;
    }

    let id = *next_explosion_id;
    *next_explosion_id = next_explosion_id.wrapping_add(1);
    let cells: Vec<GridPos> = report.hazard.iter().copied().collect();
    log.push(ChangeRecord::ExplosionStarted {
        id,
        cells: cells.clone(),
        duration: rules.explosion_duration,
    });
    store.explosions.push(Explosion {
        id,
        cells,
        remaining: rules.explosion_duration,
    });

    let drop_chance = rules.power_up_chance.clamp(0.0, 1.0);
    for pos in destroyed {
        map.set(pos, TileKind::Empty);
        log.push(ChangeRecord::BlockDestroyed { pos });
        report.destroyed_blocks.push(pos);

        if rng.gen_bool(drop_chance) {
            let kind = PowerUpKind::ALL[rng.gen_range(0..PowerUpKind::ALL.len())];
            store.power_ups.insert(pos, kind);
            log.push(ChangeRecord::PowerUpSpawned { pos, kind });
        }
    }

    for player in store.players.iter_mut() {
        if !player.is_alive() || !report.hazard.contains(&player.cell()) {
            continue;
        }
        let died = player.damage();
        report.damaged.push(player.id);
        log.push(ChangeRecord::PlayerDamaged {
            id: player.id,
            lives: player.lives(),
        });
        if died {
            report.killed.push(player.id);
            log.push(ChangeRecord::PlayerDied { id: player.id });
        }
    }

    let mut index = 0;
    store.bombs.retain(|_| {
        let keep = !resolved[index];
        index += 1;
        keep
    });

    trace!(
        "Detonated {} bombs covering {} cells",
        report.detonated,
        report.hazard.len()
    );
    report
}

/// Walks one ray out from `origin`.
///
/// Stops before a Wall or the grid edge. A Block is included, queued for
/// destruction, and ends the ray. Armed bombs on the way are ignited.
fn trace_ray(
    origin: GridPos,
    direction: Direction,
    radius: u32,
    map: &Map,
    bombs: &mut [Bomb],
    hazard: &mut BTreeSet<GridPos>,
    destroyed: &mut BTreeSet<GridPos>,
) {
    let (dx, dy) = direction.delta();
    for step in 1..=radius as i32 {
        let cell = origin.offset(dx * step, dy * step);
        match map.get(cell) {
            None | Some(TileKind::Wall) => break,
            Some(TileKind::Block) => {
                hazard.insert(cell);
                destroyed.insert(cell);
                break;
            }
            Some(TileKind::Empty) => {
                hazard.insert(cell);
                for bomb in bombs.iter_mut().filter(|b| b.pos == cell && !b.is_ready()) {
                    bomb.fuse = 0.0;
                }
            }
        }
    }
}
