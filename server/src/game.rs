//! The simulation instance and its fixed-step tick.
//!
//! A [`Game`] is built fresh when a countdown completes and dropped when the
//! game ends; nothing carries over between games. Between ticks the only
//! writes allowed are intent updates (`start_moving`, `stop_moving`,
//! `place_bomb`) and eliminations on disconnect. Everything else happens in
//! [`Game::tick`], which runs these sub-steps in order:
//!
//! 1. bot decisions and queued bomb placements
//! 2. movement for every living player
//! 3. fuse countdown
//! 4. detonation to fix point
//! 5. power-up collection
//! 6. explosion expiry
//! 7. change log flush
//! 8. win check

use crate::ai;
use crate::changelog::ChangeLog;
use crate::config::{GameRules, SPAWN_CORNERS};
use crate::detonation::{resolve_detonations, tick_fuses};
use crate::entity::{EntityStore, Player};
use crate::map_gen;
use crate::movement::resolve_movement;
use crate::powerup::collect_power_ups;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ChangeRecord, Direction, GameResult, GameSnapshot, Map, Participant, PLAYER_SIZE,
};

/// Everything a single tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub tick: u64,
    /// Mutations in emission order. Empty on an idle tick.
    pub changes: Vec<ChangeRecord>,
    /// Set on the tick the game ended. No further ticks are run after it.
    pub game_over: Option<GameResult>,
}

pub struct Game {
    tick: u64,
    map: Map,
    store: EntityStore,
    log: ChangeLog,
    rules: GameRules,
    rng: StdRng,
    bots: Vec<u32>,
    next_explosion_id: u32,
    finished: bool,
}

impl Game {
    /// Generates a fresh map and seats `participants` in join order, then
    /// fills up to `bot_count` remaining corners with bots.
    pub fn new(participants: &[Participant], bot_count: usize, rules: GameRules) -> Self {
        let mut rng = match rules.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let map = map_gen::generate(rules.map_cols, rules.map_rows, rules.block_density, &mut rng);

        let mut seats = participants.to_vec();
        let free = SPAWN_CORNERS.saturating_sub(seats.len());
        let bot_ids = free_bot_ids(participants, bot_count.min(free));
        for (i, id) in bot_ids.iter().enumerate() {
            seats.push(Participant {
                id: *id,
                nickname: format!("bot-{}", i + 1),
            });
        }

        let mut game = Self::with_map(map, &seats, rules, rng);
        game.bots = bot_ids;
        game
    }

    /// Builds a game on a given map. Players spawn in the pixel corners.
    pub fn with_map(map: Map, participants: &[Participant], rules: GameRules, rng: StdRng) -> Self {
        let mut store = EntityStore::new();
        let spawns = spawn_points(&map);

        if participants.len() > spawns.len() {
            warn!(
                "{} participants but only {} spawn corners, extra players are left out",
                participants.len(),
                spawns.len()
            );
        }
        for (participant, (x, y)) in participants.iter().zip(spawns) {
            store.spawn_player(Player::new(
                participant.id,
                participant.nickname.clone(),
                x,
                y,
                &rules,
            ));
        }

        Self {
            tick: 0,
            map,
            store,
            log: ChangeLog::new(),
            rules,
            rng,
            bots: Vec::new(),
            next_explosion_id: 1,
            finished: false,
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn start_moving(&mut self, id: u32, direction: Direction) -> bool {
        self.store.set_intent(id, direction, true)
    }

    pub fn stop_moving(&mut self, id: u32, direction: Direction) -> bool {
        self.store.set_intent(id, direction, false)
    }

    /// Queues a bomb for the player's next tick. Capacity and cell checks
    /// happen when the tick places it.
    pub fn place_bomb(&mut self, id: u32) -> bool {
        self.store.request_bomb(id)
    }

    /// Treats a departed player as eliminated. Their bombs stay armed.
    pub fn disconnect(&mut self, id: u32) -> bool {
        let eliminated = self.store.eliminate(id, &mut self.log);
        if eliminated {
            info!("Player {} left mid-game and was eliminated", id);
        }
        eliminated
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            tick: self.tick,
            map: self.map.clone(),
            players: self.store.players.iter().map(Player::view).collect(),
            bombs: self.store.bombs.iter().map(|b| b.view()).collect(),
            explosions: self.store.explosions.iter().map(|e| e.view()).collect(),
            power_ups: self.store.power_up_views(),
        }
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome {
                tick: self.tick,
                changes: Vec::new(),
                game_over: None,
            };
        }

        self.tick += 1;
        let dt = self.rules.tick_seconds();

        self.drive_bots();
        self.store.place_pending_bombs(&self.rules, &mut self.log);

        for player in self.store.players.iter_mut() {
            resolve_movement(player, &self.map, &mut self.log);
        }

        // Explosions started this tick begin counting down on the next one.
        let settled = self.store.explosions.len();
        tick_fuses(&mut self.store.bombs, dt);
        let report = resolve_detonations(
            &mut self.store,
            &mut self.map,
            &self.rules,
            &mut self.rng,
            &mut self.next_explosion_id,
            &mut self.log,
        );
        if report.detonated > 0 {
            debug!(
                "Tick {}: {} bombs detonated, {} blocks destroyed, {} players hit",
                self.tick,
                report.detonated,
                report.destroyed_blocks.len(),
                report.damaged.len()
            );
        }

        collect_power_ups(&mut self.store, &self.rules, &mut self.log);
        self.expire_explosions(settled, dt);

        let changes = self.log.flush();

        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {} alive, {} bombs, {} explosions",
                self.tick,
                self.store.alive_count(),
                self.store.bombs.len(),
                self.store.explosions.len()
            );
        }

        let game_over = self.check_winner();
        TickOutcome {
            tick: self.tick,
            changes,
            game_over,
        }
    }

    fn drive_bots(&mut self) {
        for i in 0..self.bots.len() {
            let id = self.bots[i];
            // Stagger bots so they do not all think on the same tick.
            if (self.tick + i as u64 * 4) % ai::DECISION_INTERVAL != 0 {
                continue;
            }
            let Some(bot) = self.store.player(id) else {
                continue;
            };
            if !bot.is_alive() {
                continue;
            }
            let decision = ai::decide(bot, &self.map, &self.store, &mut self.rng);
            ai::apply(decision, id, &mut self.store);
        }
    }

    /// Ages the first `settled` explosions and drops the ones that ran out.
    fn expire_explosions(&mut self, settled: usize, dt: f32) {
        let mut cleared = Vec::new();
        let mut index = 0;
        self.store.explosions.retain_mut(|explosion| {
            index += 1;
            if index > settled {
                return true;
            }
            explosion.remaining -= dt;
            if explosion.remaining <= 0.0 {
                cleared.push(explosion.id);
                false
            } else {
                true
            }
        });

        if !cleared.is_empty() {
            self.log.push(ChangeRecord::ExplosionsCleared { ids: cleared });
        }
    }

    fn check_winner(&mut self) -> Option<GameResult> {
        if self.store.alive_count() > 1 {
            return None;
        }

        self.finished = true;
        let winner = self
            .store
            .players
            .iter()
            .find(|p| p.is_alive())
            .map(Player::summary);
        match &winner {
            Some(w) => info!("Game over after {} ticks, winner: {}", self.tick, w.nickname),
            None => info!("Game over after {} ticks, no survivors", self.tick),
        }

        Some(GameResult {
            winner,
            standings: self.store.players.iter().map(Player::summary).collect(),
        })
    }
}

/// Picks `count` bot ids from `BOT_ID_BASE` upwards, skipping any id a
/// participant already holds.
fn free_bot_ids(participants: &[Participant], count: usize) -> Vec<u32> {
    (ai::BOT_ID_BASE..=u32::MAX)
        .filter(|id| participants.iter().all(|p| p.id != *id))
        .take(count)
        .collect()
}

/// The four pixel corners, in seating order.
pub fn spawn_points(map: &Map) -> [(f32, f32); SPAWN_CORNERS] {
    let right = (map.pixel_width() - PLAYER_SIZE).max(0.0);
    let bottom = (map.pixel_height() - PLAYER_SIZE).max(0.0);
    [(0.0, 0.0), (right, 0.0), (0.0, bottom), (right, bottom)]
}
