//! Authoritative records for everything that lives on the map.
//!
//! Input handlers only touch the intent fields here (`set_intent`,
//! `request_bomb`); positions, fuses and stats change exclusively inside a
//! tick.

use crate::changelog::ChangeLog;
use crate::config::GameRules;
use shared::{
    cell_of_point, BombView, ChangeRecord, Direction, ExplosionView, GridPos, PlayerStats,
    PlayerSummary, PlayerView, PowerUpKind, PowerUpView,
};
use std::collections::BTreeMap;

/// Four independent movement axes. A diagonal is two of them held at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementIntent {
    pub fn set(&mut self, direction: Direction, active: bool) {
        match direction {
            Direction::Up => self.up = active,
            Direction::Down => self.down = active,
            Direction::Left => self.left = active,
            Direction::Right => self.right = active,
        }
    }

    /// Signed unit direction per axis; opposite keys cancel out.
    pub fn axes(&self) -> (f32, f32) {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        (axis(self.left, self.right), axis(self.up, self.down))
    }

    pub fn is_idle(&self) -> bool {
        self.axes() == (0.0, 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub nickname: String,
    /// Top-left corner of the hitbox in pixels.
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub stats: PlayerStats,
    lives: u32,
    alive: bool,
    pub intent: MovementIntent,
    /// Set by `place_bomb` intents, consumed at the start of the next tick.
    pub bomb_requested: bool,
}

impl Player {
    pub fn new(id: u32, nickname: String, x: f32, y: f32, rules: &GameRules) -> Self {
        Self {
            id,
            nickname,
            x,
            y,
            size: shared::PLAYER_SIZE,
            stats: PlayerStats {
                speed: rules.start_speed,
                bombs: rules.start_bombs,
                flame: rules.start_flame,
            },
            lives: rules.start_lives.max(1),
            alive: true,
            intent: MovementIntent::default(),
            bomb_requested: false,
        }
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.size / 2.0, self.y + self.size / 2.0)
    }

    /// The cell under the centre of the hitbox.
    pub fn cell(&self) -> GridPos {
        let (cx, cy) = self.center();
        cell_of_point(cx, cy)
    }

    /// Takes one life. Returns true if this hit was fatal.
    pub fn damage(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.kill();
            return true;
        }
        false
    }

    /// Marks the player dead for the rest of the game.
    pub fn kill(&mut self) {
        self.alive = false;
        self.intent = MovementIntent::default();
        self.bomb_requested = false;
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            nickname: self.nickname.clone(),
            x: self.x,
            y: self.y,
            size: self.size,
            stats: self.stats,
            lives: self.lives,
            alive: self.alive,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            nickname: self.nickname.clone(),
            lives: self.lives,
            alive: self.alive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub owner: u32,
    pub pos: GridPos,
    /// Seconds until detonation; at or below zero the bomb is ready.
    pub fuse: f32,
    /// Owner's flame stat at placement time.
    pub radius: u32,
}

impl Bomb {
    pub fn is_ready(&self) -> bool {
        self.fuse <= 0.0
    }

    pub fn view(&self) -> BombView {
        BombView {
            owner: self.owner,
            pos: self.pos,
            fuse: self.fuse,
            radius: self.radius,
        }
    }
}

/// Short-lived marker for the cells a detonation pass covered.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub id: u32,
    pub cells: Vec<GridPos>,
    pub remaining: f32,
}

impl Explosion {
    pub fn view(&self) -> ExplosionView {
        ExplosionView {
            id: self.id,
            cells: self.cells.clone(),
            remaining: self.remaining,
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    /// In join order, which is also spawn order.
    pub players: Vec<Player>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    /// At most one power-up per cell.
    pub power_ups: BTreeMap<GridPos, PowerUpKind>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_player(&mut self, player: Player) {
        self.players.push(player);
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    /// Sets or clears one movement axis. Unknown or dead players are ignored.
    pub fn set_intent(&mut self, id: u32, direction: Direction, active: bool) -> bool {
        match self.player_mut(id) {
            Some(player) if player.is_alive() => {
                player.intent.set(direction, active);
                true
            }
            _ => false,
        }
    }

    /// Drops every held direction.
    pub fn clear_intent(&mut self, id: u32) -> bool {
        match self.player_mut(id) {
            Some(player) => {
                player.intent = MovementIntent::default();
                true
            }
            None => false,
        }
    }

    pub fn request_bomb(&mut self, id: u32) -> bool {
        match self.player_mut(id) {
            Some(player) if player.is_alive() => {
                player.bomb_requested = true;
                true
            }
            _ => false,
        }
    }

    pub fn live_bombs_of(&self, owner: u32) -> usize {
        self.bombs.iter().filter(|b| b.owner == owner).count()
    }

    pub fn bomb_at(&self, pos: GridPos) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.pos == pos)
    }

    /// Drops a bomb on the player's current cell.
    ///
    /// Refused when the player is missing or dead, already has as many live
    /// bombs as their capacity allows, or the cell is already occupied.
    pub fn try_place_bomb(&mut self, id: u32, rules: &GameRules, log: &mut ChangeLog) -> bool {
        let Some(player) = self.player(id) else {
            return false;
        };
        if !player.is_alive() {
            return false;
        }

        let pos = player.cell();
        let radius = player.stats.flame;
        if self.live_bombs_of(id) >= player.stats.bombs as usize || self.bomb_at(pos).is_some() {
            return false;
        }

        let bomb = Bomb {
            owner: id,
            pos,
            fuse: rules.bomb_fuse,
            radius,
        };
        log.push(ChangeRecord::BombPlaced {
            owner: id,
            pos,
            fuse: bomb.fuse,
            radius,
        });
        self.bombs.push(bomb);
        true
    }

    /// Resolves every queued `place_bomb` request in join order.
    pub fn place_pending_bombs(&mut self, rules: &GameRules, log: &mut ChangeLog) {
        let mut requesters = Vec::new();
        for player in self.players.iter_mut() {
            if std::mem::take(&mut player.bomb_requested) {
                requesters.push(player.id);
            }
        }

        for id in requesters {
            self.try_place_bomb(id, rules, log);
        }
    }

    /// Takes a player out of the game without removing their seat.
    pub fn eliminate(&mut self, id: u32, log: &mut ChangeLog) -> bool {
        match self.player_mut(id) {
            Some(player) if player.is_alive() => {
                player.kill();
                log.push(ChangeRecord::PlayerDied { id });
                true
            }
            _ => false,
        }
    }

    pub fn power_up_views(&self) -> Vec<PowerUpView> {
        self.power_ups
            .iter()
            .map(|(pos, kind)| PowerUpView {
                pos: *pos,
                kind: *kind,
            })
            .collect()
    }
}
