//! Integration tests for the game server
//!
//! These tests drive the lobby, the simulation and the TCP server together
//! through their public APIs only.

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{GameRules, LobbyConfig, ServerConfig};
use server::game::Game;
use server::lobby::{Lobby, LobbyEvent};
use server::network::{read_packet, write_packet, Server, ServerMessage};
use shared::{
    ChangeRecord, Direction, GameSnapshot, GridPos, LobbyStatus, Map, Packet, Participant,
    PowerUpKind, TileKind,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn participants(names: &[&str]) -> Vec<Participant> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Participant {
            id: i as u32 + 1,
            nickname: name.to_string(),
        })
        .collect()
}

/// Client-side copy of the world, kept current purely from change records.
struct Mirror {
    snapshot: GameSnapshot,
    power_ups: BTreeMap<GridPos, PowerUpKind>,
}

impl Mirror {
    fn new(snapshot: GameSnapshot) -> Self {
        let power_ups = snapshot.power_ups.iter().map(|p| (p.pos, p.kind)).collect();
        Self { snapshot, power_ups }
    }

    fn apply(&mut self, record: &ChangeRecord) {
        let state = &mut self.snapshot;
        match record {
            ChangeRecord::PlayerMoved { id, x, y } => {
                let player = state.players.iter_mut().find(|p| p.id == *id).unwrap();
                player.x = *x;
                player.y = *y;
            }
            ChangeRecord::BombPlaced {
                owner,
                pos,
                fuse,
                radius,
            } => state.bombs.push(shared::BombView {
                owner: *owner,
                pos: *pos,
                fuse: *fuse,
                radius: *radius,
            }),
            ChangeRecord::BombExploded { pos, .. } => state.bombs.retain(|b| b.pos != *pos),
            ChangeRecord::BlockDestroyed { pos } => {
                assert_eq!(state.map.get(*pos), Some(TileKind::Block));
                state.map.set(*pos, TileKind::Empty);
            }
            ChangeRecord::PowerUpSpawned { pos, kind } => {
                assert!(self.power_ups.insert(*pos, *kind).is_none());
            }
            ChangeRecord::PowerUpCollected { pos, .. } => {
                assert!(self.power_ups.remove(pos).is_some());
            }
            ChangeRecord::StatsChanged { id, stats } => {
                state.players.iter_mut().find(|p| p.id == *id).unwrap().stats = *stats;
            }
            ChangeRecord::PlayerDamaged { id, lives } => {
                state.players.iter_mut().find(|p| p.id == *id).unwrap().lives = *lives;
            }
            ChangeRecord::PlayerDied { id } => {
                state.players.iter_mut().find(|p| p.id == *id).unwrap().alive = false;
            }
            ChangeRecord::ExplosionStarted {
                id,
                cells,
                duration,
            } => state.explosions.push(shared::ExplosionView {
                id: *id,
                cells: cells.clone(),
                remaining: *duration,
            }),
            ChangeRecord::ExplosionsCleared { ids } => {
                state.explosions.retain(|e| !ids.contains(&e.id));
            }
        }
    }

    fn assert_matches(&self, actual: &GameSnapshot) {
        let state = &self.snapshot;
        assert_eq!(state.map, actual.map);
        assert_eq!(state.players.len(), actual.players.len());
        for (mine, theirs) in state.players.iter().zip(&actual.players) {
            assert_eq!(mine.id, theirs.id);
            assert_eq!(mine.x, theirs.x);
            assert_eq!(mine.y, theirs.y);
            assert_eq!(mine.lives, theirs.lives);
            assert_eq!(mine.alive, theirs.alive);
            assert_eq!(mine.stats, theirs.stats);
        }

        let mut bombs: Vec<(u32, GridPos)> = state.bombs.iter().map(|b| (b.owner, b.pos)).collect();
        let mut actual_bombs: Vec<(u32, GridPos)> =
            actual.bombs.iter().map(|b| (b.owner, b.pos)).collect();
        bombs.sort();
        actual_bombs.sort();
        assert_eq!(bombs, actual_bombs);

        let mut explosions: Vec<u32> = state.explosions.iter().map(|e| e.id).collect();
        explosions.sort();
        let actual_explosions: Vec<u32> = actual.explosions.iter().map(|e| e.id).collect();
        assert_eq!(explosions, actual_explosions);

        let actual_power_ups: BTreeMap<GridPos, PowerUpKind> =
            actual.power_ups.iter().map(|p| (p.pos, p.kind)).collect();
        assert_eq!(self.power_ups, actual_power_ups);
    }
}

/// SIMULATION TESTS
mod simulation_tests {
    use super::*;

    /// Replaying every diff on top of the start snapshot must reproduce the
    /// server state exactly, tick after tick.
    #[test]
    fn diffs_reconstruct_server_state() {
        let rules = GameRules {
            seed: Some(2024),
            bomb_fuse: 1.0,
            ..GameRules::default()
        };
        let mut game = Game::new(&[], 4, rules);
        let mut mirror = Mirror::new(game.snapshot());
        let mut records_seen = 0;

        for _ in 0..6000 {
            let outcome = game.tick();
            records_seen += outcome.changes.len();
            for record in &outcome.changes {
                mirror.apply(record);
            }
            mirror.assert_matches(&game.snapshot());
            if outcome.game_over.is_some() {
                break;
            }
        }
        assert!(records_seen > 0);
    }

    /// Scripted two-player duel in a corridor: one player runs from their
    /// own bomb, the other walks into the blast.
    #[test]
    fn corridor_duel_has_a_winner() {
        let rules = GameRules {
            start_lives: 1,
            start_flame: 3,
            power_up_chance: 0.0,
            ..GameRules::default()
        };
        let map = Map::filled(5, 1, TileKind::Empty);
        let mut game = Game::with_map(
            map,
            &participants(&["runner", "walker"]),
            rules,
            StdRng::seed_from_u64(1),
        );

        game.place_bomb(1);
        game.start_moving(1, Direction::Right);
        game.start_moving(2, Direction::Left);

        for tick in 1..=95 {
            if tick == 86 {
                game.stop_moving(2, Direction::Left);
            }
            let outcome = game.tick();
            assert!(outcome.game_over.is_none());
        }
        game.stop_moving(1, Direction::Right);

        let runner = game.store().player(1).unwrap();
        let walker = game.store().player(2).unwrap();
        assert_eq!(runner.cell(), GridPos::new(4, 0));
        assert_eq!(walker.cell(), GridPos::new(1, 0));
        assert_eq!(game.store().bombs.len(), 1);

        let mut result = None;
        for _ in 0..200 {
            let outcome = game.tick();
            if let Some(over) = outcome.game_over {
                assert!(outcome
                    .changes
                    .contains(&ChangeRecord::PlayerDied { id: 2 }));
                result = Some(over);
                break;
            }
        }

        let result = result.expect("the bomb should have ended the game");
        assert_eq!(result.winner.map(|w| w.nickname), Some("runner".to_string()));
        assert!(game.is_finished());
        assert!(game.tick().changes.is_empty());
    }

    /// Lobby fills up, counts down and hands its roster to a new game.
    #[test]
    fn lobby_to_game_to_lobby() {
        let start = Instant::now();
        let mut lobby = Lobby::new(LobbyConfig {
            min_players: 2,
            max_players: 3,
            wait_time: Duration::from_secs(5),
            countdown: Duration::from_secs(3),
        });

        lobby.join(1, "ann", start).unwrap();
        lobby.join(2, "ben", start).unwrap();
        assert!(lobby.poll(start + Duration::from_secs(4)).is_empty());
        assert_eq!(
            lobby.poll(start + Duration::from_secs(5)),
            vec![LobbyEvent::CountdownStarted]
        );

        let roster = match lobby.poll(start + Duration::from_secs(8)).pop() {
            Some(LobbyEvent::StartGame(roster)) => roster,
            other => panic!("Expected game start, got {:?}", other),
        };
        assert_eq!(roster.len(), 2);

        let mut game = Game::new(
            &roster,
            0,
            GameRules {
                seed: Some(5),
                ..GameRules::default()
            },
        );
        assert_eq!(game.snapshot().players.len(), 2);

        game.disconnect(2);
        let outcome = game.tick();
        let result = outcome.game_over.unwrap();
        assert_eq!(result.winner.unwrap().id, 1);

        lobby.finish_game();
        assert_eq!(lobby.status(), LobbyStatus::Waiting);
        assert!(lobby.join(2, "ben", start).is_ok());
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    struct TestClient {
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: std::net::SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self { reader, writer }
        }

        async fn send(&mut self, packet: Packet) {
            write_packet(&mut self.writer, &packet).await.unwrap();
        }

        /// Reads packets until one satisfies `pred`, failing after 5 seconds.
        async fn expect<F>(&mut self, mut pred: F) -> Packet
        where
            F: FnMut(&Packet) -> bool,
        {
            let deadline = Duration::from_secs(5);
            timeout(deadline, async {
                loop {
                    let packet = read_packet(&mut self.reader)
                        .await
                        .unwrap()
                        .expect("server closed the connection");
                    if pred(&packet) {
                        return packet;
                    }
                }
            })
            .await
            .expect("timed out waiting for packet")
        }
    }

    /// Full session over real sockets: connect, join, chat, play, leave.
    #[tokio::test]
    async fn tcp_session_end_to_end() {
        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            max_connections: 4,
            bots: 0,
            lobby: LobbyConfig {
                min_players: 2,
                max_players: 2,
                wait_time: Duration::from_secs(30),
                countdown: Duration::ZERO,
            },
            rules: GameRules {
                seed: Some(9),
                ..GameRules::default()
            },
        };
        let mut server = Server::new(config).await.unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await });

        let mut alice = TestClient::connect(addr).await;
        match alice.expect(|p| matches!(p, Packet::Connected { .. })).await {
            Packet::Connected { client_id } => assert!(client_id > 0),
            _ => unreachable!(),
        }
        alice.expect(|p| matches!(p, Packet::LobbyState(_))).await;

        let mut bob = TestClient::connect(addr).await;
        bob.expect(|p| matches!(p, Packet::Connected { .. })).await;

        alice.send(Packet::Join { nickname: "alice".to_string() }).await;
        alice
            .expect(|p| matches!(p, Packet::LobbyState(view) if view.participants.len() == 1))
            .await;
        bob.send(Packet::Join { nickname: "alice".to_string() }).await;
        let rejected = bob.expect(|p| matches!(p, Packet::Rejected { .. })).await;
        assert_eq!(
            rejected,
            Packet::Rejected {
                reason: shared::RejectReason::NicknameTaken
            }
        );
        bob.send(Packet::Join { nickname: "bob".to_string() }).await;

        let started = alice.expect(|p| matches!(p, Packet::GameStarted(_))).await;
        match started {
            Packet::GameStarted(snapshot) => assert_eq!(snapshot.players.len(), 2),
            _ => unreachable!(),
        }
        bob.expect(|p| matches!(p, Packet::GameStarted(_))).await;

        bob.send(Packet::SendChat { text: "good luck".to_string() }).await;
        match alice.expect(|p| matches!(p, Packet::Chat { .. })).await {
            Packet::Chat { nickname, text, .. } => {
                assert_eq!(nickname, "bob");
                assert_eq!(text, "good luck");
            }
            _ => unreachable!(),
        }

        alice.send(Packet::StartMoving { direction: Direction::Right }).await;
        alice
            .expect(|p| {
                matches!(p, Packet::Diff { changes, .. }
                    if changes.iter().any(|c| matches!(c, ChangeRecord::PlayerMoved { .. })))
            })
            .await;

        bob.send(Packet::Disconnect).await;
        match alice.expect(|p| matches!(p, Packet::GameOver(_))).await {
            Packet::GameOver(result) => {
                assert_eq!(result.winner.map(|w| w.nickname), Some("alice".to_string()));
            }
            _ => unreachable!(),
        }
        match alice.expect(|p| matches!(p, Packet::LobbyState(_))).await {
            Packet::LobbyState(view) => {
                assert_eq!(view.status, LobbyStatus::Waiting);
                assert!(view.participants.is_empty());
            }
            _ => unreachable!(),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        alice
            .expect(|p| matches!(p, Packet::Disconnected { .. }))
            .await;
        handle.await.unwrap().unwrap();
    }

    /// A frame claiming to be larger than the limit gets the connection
    /// closed without bringing the server down.
    #[tokio::test]
    async fn oversized_frame_closes_only_that_connection() {
        use tokio::io::AsyncWriteExt;

        let config = ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let mut server = Server::new(config).await.unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await });

        let mut bad = TestClient::connect(addr).await;
        bad.expect(|p| matches!(p, Packet::Connected { .. })).await;
        bad.writer.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let closed = timeout(Duration::from_secs(5), async {
            loop {
                match read_packet(&mut bad.reader).await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        let mut good = TestClient::connect(addr).await;
        good.expect(|p| matches!(p, Packet::Connected { .. })).await;

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap().unwrap();
    }
}
