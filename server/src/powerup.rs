use crate::changelog::ChangeLog;
use crate::config::GameRules;
use crate::entity::EntityStore;
use shared::{ChangeRecord, PlayerStats, PowerUpKind};

/// Applies one pickup to a stat block, honouring any configured caps.
pub fn apply(kind: PowerUpKind, stats: &mut PlayerStats, rules: &GameRules) {
    match kind {
        PowerUpKind::Bombs => {
            stats.bombs += 1;
            if let Some(cap) = rules.max_bombs {
                stats.bombs = stats.bombs.min(cap);
            }
        }
        PowerUpKind::Flame => {
            stats.flame += 1;
            if let Some(cap) = rules.max_flame {
                stats.flame = stats.flame.min(cap);
            }
        }
        PowerUpKind::Speed => {
            stats.speed += rules.speed_boost;
            if let Some(cap) = rules.max_speed {
                stats.speed = stats.speed.min(cap);
            }
        }
    }
}

/// Hands every power-up under a living player's centre cell to that player.
///
/// Players are checked in join order and a power-up is removed the moment it
/// is taken, so two players standing on the same cell cannot both collect it.
/// Returns the number of pickups.
pub fn collect_power_ups(store: &mut EntityStore, rules: &GameRules, log: &mut ChangeLog) -> usize {
    if store.power_ups.is_empty() {
        return 0;
    }

    let mut collected = 0;
    for player in store.players.iter_mut().filter(|p| p.is_alive()) {
        let pos = player.cell();
        let Some(kind) = store.power_ups.remove(&pos) else {
            continue;
        };

        apply(kind, &mut player.stats, rules);
        log.push(ChangeRecord::PowerUpCollected {
            player: player.id,
            pos,
            kind,
        });
        log.push(ChangeRecord::StatsChanged {
            id: player.id,
            stats: player.stats,
        });
        collected += 1;
    }
    collected
}
