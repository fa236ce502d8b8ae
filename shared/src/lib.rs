use serde::{Deserialize, Serialize};

pub mod map;

pub use map::{
    cell_of, cell_of_point, is_blocked, GridPos, Map, TileKind, CELL_SIZE, MAP_COLS, MAP_ROWS,
    PLAYER_SIZE,
};

/// Largest frame body accepted on the wire.
pub const MAX_FRAME_LEN: usize = 64 * 1024;
/// Chat messages are cut to this many characters before relaying.
pub const MAX_CHAT_LEN: usize = 256;
pub const MAX_NICKNAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit step in cell coordinates (y grows downwards).
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    /// One more concurrent bomb.
    Bombs,
    /// One more cell of blast radius.
    Flame,
    Speed,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [PowerUpKind::Bombs, PowerUpKind::Flame, PowerUpKind::Speed];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Pixels per tick.
    pub speed: f32,
    pub bombs: u32,
    pub flame: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: u32,
    pub nickname: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub stats: PlayerStats,
    pub lives: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BombView {
    pub owner: u32,
    pub pos: GridPos,
    pub fuse: f32,
    pub radius: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosionView {
    pub id: u32,
    pub cells: Vec<GridPos>,
    pub remaining: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpView {
    pub pos: GridPos,
    pub kind: PowerUpKind,
}

/// Complete simulation state, sent once when a game starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    pub map: Map,
    pub players: Vec<PlayerView>,
    pub bombs: Vec<BombView>,
    pub explosions: Vec<ExplosionView>,
    pub power_ups: Vec<PowerUpView>,
}

/// One atomic mutation of the authoritative state.
///
/// Clients replay these in order against their copy of the last snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeRecord {
    PlayerMoved {
        id: u32,
        x: f32,
        y: f32,
    },
    BombPlaced {
        owner: u32,
        pos: GridPos,
        fuse: f32,
        radius: u32,
    },
    BombExploded {
        owner: u32,
        pos: GridPos,
    },
    BlockDestroyed {
        pos: GridPos,
    },
    PowerUpSpawned {
        pos: GridPos,
        kind: PowerUpKind,
    },
    PowerUpCollected {
        player: u32,
        pos: GridPos,
        kind: PowerUpKind,
    },
    StatsChanged {
        id: u32,
        stats: PlayerStats,
    },
    PlayerDamaged {
        id: u32,
        lives: u32,
    },
    PlayerDied {
        id: u32,
    },
    ExplosionStarted {
        id: u32,
        cells: Vec<GridPos>,
        duration: f32,
    },
    ExplosionsCleared {
        ids: Vec<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyStatus {
    Waiting,
    Countdown,
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: u32,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyView {
    pub status: LobbyStatus,
    pub participants: Vec<Participant>,
    /// Whole seconds left, only while counting down.
    pub countdown_remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: u32,
    pub nickname: String,
    pub lives: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    /// `None` when the last players went down together.
    pub winner: Option<PlayerSummary>,
    pub standings: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    GameInProgress,
    LobbyFull,
    NicknameTaken,
    InvalidNickname,
    AlreadyJoined,
    NotJoined,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::GameInProgress => "a game is already in progress",
            RejectReason::LobbyFull => "the lobby is full",
            RejectReason::NicknameTaken => "that nickname is already taken",
            RejectReason::InvalidNickname => "nickname must be 1-16 visible characters",
            RejectReason::AlreadyJoined => "already joined",
            RejectReason::NotJoined => "join the lobby first",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Join {
        nickname: String,
    },
    StartMoving {
        direction: Direction,
    },
    StopMoving {
        direction: Direction,
    },
    PlaceBomb,
    SendChat {
        text: String,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Rejected {
        reason: RejectReason,
    },
    LobbyState(LobbyView),
    GameStarted(GameSnapshot),
    Diff {
        tick: u64,
        changes: Vec<ChangeRecord>,
    },
    GameOver(GameResult),
    Chat {
        sender_id: u32,
        nickname: String,
        text: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Encodes a packet as a 4-byte big-endian length followed by its bincode body.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    let body = bincode::serialize(packet)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Box::new(bincode::ErrorKind::SizeLimit));
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame body (the bytes after the length prefix).
pub fn decode_body(body: &[u8]) -> Result<Packet, bincode::Error> {
    bincode::deserialize(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn open_map() -> Map {
        Map::filled(5, 5, TileKind::Empty)
    }

    #[test]
    fn test_cell_of() {
        assert_eq!(cell_of(0.0), 0);
        assert_eq!(cell_of(49.9), 0);
        assert_eq!(cell_of(50.0), 1);
        assert_eq!(cell_of(-0.5), -1);
        assert_eq!(cell_of_point(120.0, 260.0), GridPos::new(2, 5));
    }

    #[test]
    fn test_map_get_set_bounds() {
        let mut map = open_map();
        assert_eq!(map.get(GridPos::new(4, 4)), Some(TileKind::Empty));
        assert_eq!(map.get(GridPos::new(5, 0)), None);
        assert_eq!(map.get(GridPos::new(-1, 0)), None);

        assert!(map.set(GridPos::new(2, 3), TileKind::Wall));
        assert!(!map.set(GridPos::new(0, 9), TileKind::Wall));
        assert_eq!(map.get(GridPos::new(2, 3)), Some(TileKind::Wall));
        assert_eq!(map.count(TileKind::Wall), 1);
        assert_approx_eq!(map.pixel_width(), 5.0 * CELL_SIZE);
    }

    #[test]
    fn test_cells_iteration_order() {
        let map = Map::filled(3, 2, TileKind::Empty);
        let positions: Vec<GridPos> = map.cells().map(|(p, _)| p).collect();
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], GridPos::new(0, 0));
        assert_eq!(positions[3], GridPos::new(0, 1));
        assert_eq!(positions[5], GridPos::new(2, 1));
    }

    #[test]
    fn test_is_blocked_open_ground() {
        let map = open_map();
        assert!(!is_blocked(0.0, 0.0, PLAYER_SIZE, &map));
        assert!(!is_blocked(105.0, 105.0, PLAYER_SIZE, &map));
    }

    #[test]
    fn test_is_blocked_outside_grid() {
        let map = open_map();
        assert!(is_blocked(-1.0, 0.0, PLAYER_SIZE, &map));
        assert!(is_blocked(0.0, -0.5, PLAYER_SIZE, &map));
        assert!(is_blocked(map.pixel_width() - PLAYER_SIZE + 1.0, 0.0, PLAYER_SIZE, &map));
        assert!(!is_blocked(map.pixel_width() - PLAYER_SIZE, 0.0, PLAYER_SIZE, &map));
    }

    #[test]
    fn test_is_blocked_flush_against_wall() {
        let mut map = open_map();
        map.set(GridPos::new(1, 0), TileKind::Wall);

        // Right edge exactly on the wall boundary.
        assert!(!is_blocked(CELL_SIZE - PLAYER_SIZE, 0.0, PLAYER_SIZE, &map));
        assert!(is_blocked(CELL_SIZE - PLAYER_SIZE + 0.5, 0.0, PLAYER_SIZE, &map));
    }

    #[test]
    fn test_is_blocked_midpoint_catches_thin_overlap() {
        // Box 130px wide spans three columns; only the middle one is solid,
        // so none of the corners lands on it.
        let mut map = open_map();
        map.set(GridPos::new(1, 1), TileKind::Block);
        assert!(is_blocked(10.0, 55.0, 130.0, &map));
        assert!(!is_blocked(10.0, 155.0, 130.0, &map));
    }

    #[test]
    fn test_direction_deltas() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Right.delta(), (1, 0));
        assert_eq!(Direction::ALL.len(), 4);
    }

    #[test]
    fn test_frame_encoding() {
        let packet = Packet::Join {
            nickname: "alice".to_string(),
        };
        let frame = encode_frame(&packet).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);

        let decoded = decode_body(&frame[4..]).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_packet_serialization_diff() {
        let packet = Packet::Diff {
            tick: 42,
            changes: vec![
                ChangeRecord::PlayerMoved {
                    id: 1,
                    x: 12.5,
                    y: 0.0,
                },
                ChangeRecord::ExplosionStarted {
                    id: 3,
                    cells: vec![GridPos::new(1, 1), GridPos::new(1, 2)],
                    duration: 0.5,
                },
            ],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Diff { tick, changes } => {
                assert_eq!(tick, 42);
                assert_eq!(changes.len(), 2);
                match &changes[0] {
                    ChangeRecord::PlayerMoved { id, x, .. } => {
                        assert_eq!(*id, 1);
                        assert_approx_eq!(*x, 12.5);
                    }
                    other => panic!("Wrong record after deserialization: {:?}", other),
                }
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let packet = Packet::SendChat {
            text: "x".repeat(MAX_FRAME_LEN + 1),
        };
        assert!(encode_frame(&packet).is_err());
    }

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(RejectReason::LobbyFull.to_string(), "the lobby is full");
        assert!(!RejectReason::NicknameTaken.to_string().is_empty());
    }
}
