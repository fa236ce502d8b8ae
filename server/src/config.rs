//! Runtime configuration for the server, the lobby and the simulation rules.
//!
//! Everything here has a `Default` matching the classic rule set; the binary
//! overrides individual fields from command line flags.

use std::time::Duration;

/// Number of spawn corners on the map, and so the hard player cap.
pub const SPAWN_CORNERS: usize = 4;

/// Constants the simulation runs with. One copy is handed to each new game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    /// Simulation steps per second.
    pub tick_rate: u32,
    pub map_cols: usize,
    pub map_rows: usize,
    /// Chance for a non-reserved, non-wall cell to start as a Block.
    pub block_density: f64,
    pub start_lives: u32,
    /// Pixels per tick.
    pub start_speed: f32,
    pub start_bombs: u32,
    pub start_flame: u32,
    /// Seconds between placing a bomb and its detonation.
    pub bomb_fuse: f32,
    /// Seconds an explosion stays on the map.
    pub explosion_duration: f32,
    pub power_up_chance: f64,
    pub speed_boost: f32,
    pub max_speed: Option<f32>,
    pub max_bombs: Option<u32>,
    pub max_flame: Option<u32>,
    /// Fixed seed for map generation and drops. Random when `None`.
    pub seed: Option<u64>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            map_cols: shared::MAP_COLS,
            map_rows: shared::MAP_ROWS,
            block_density: 0.75,
            start_lives: 3,
            start_speed: 2.0,
            start_bombs: 1,
            start_flame: 1,
            bomb_fuse: 3.0,
            explosion_duration: 0.5,
            power_up_chance: 0.3,
            speed_boost: 0.5,
            max_speed: None,
            max_bombs: None,
            max_flame: None,
            seed: None,
        }
    }
}

impl GameRules {
    /// Length of one tick in seconds.
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(self.tick_seconds())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LobbyConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// How long the lobby waits for more players once the minimum is met.
    pub wait_time: Duration,
    pub countdown: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: SPAWN_CORNERS,
            wait_time: Duration::from_secs(20),
            countdown: Duration::from_secs(10),
        }
    }
}

impl LobbyConfig {
    /// Clamps the player limits into a playable range.
    pub fn normalized(mut self) -> Self {
        self.max_players = self.max_players.clamp(1, SPAWN_CORNERS);
        self.min_players = self.min_players.clamp(1, self.max_players);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Open connections allowed, joined or not.
    pub max_connections: usize,
    /// Empty seats filled with bots when a game starts.
    pub bots: usize,
    pub lobby: LobbyConfig,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            max_connections: 32,
            bots: 0,
            lobby: LobbyConfig::default(),
            rules: GameRules::default(),
        }
    }
}
