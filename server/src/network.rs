//! Server network layer: TCP framing, connection tasks and the owning loop
//!
//! Every connection gets a reader task and a writer task. Readers forward
//! decoded packets into one channel; the [`Server`] loop is the only place
//! lobby and game state are touched, so a packet is always handled between
//! two ticks and never during one.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::Game;
use crate::lobby::{Lobby, LobbyEvent};
use log::{debug, error, info, warn};
use shared::{decode_body, encode_frame, Packet, Participant, RejectReason, MAX_CHAT_LEN, MAX_FRAME_LEN};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        client_id: u32,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
    },
    PacketReceived {
        client_id: u32,
        packet: Packet,
    },
    ClientDisconnected {
        client_id: u32,
    },
    Shutdown,
}

/// Reads one length-prefixed frame.
///
/// Returns `Ok(None)` on a clean end of stream before a new frame starts.
/// Oversized lengths are refused before the body is allocated.
pub async fn read_packet<R>(reader: &mut R) -> io::Result<Option<Packet>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_body(&body)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes one length-prefixed frame.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Main server owning the lobby, the current game and all connections
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    lobby: Lobby,
    game: Option<Game>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(&config.addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_connections),
            lobby: Lobby::new(config.lobby.clone()),
            game: None,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A sender that can stop [`Server::run`] with [`ServerMessage::Shutdown`].
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the task accepting new connections
    fn spawn_acceptor(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            let mut next_client_id: u32 = 1;

            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }

                let client_id = next_client_id;
                next_client_id = next_client_id.wrapping_add(1).max(1);

                let (read_half, write_half) = stream.into_split();
                let (sender, outbound) = mpsc::unbounded_channel();
                tokio::spawn(write_loop(client_id, write_half, outbound));

                let connected = ServerMessage::ClientConnected {
                    client_id,
                    addr,
                    sender,
                };
                if let Err(e) = server_tx.send(connected) {
                    error!("Failed to send connection to main loop: {}", e);
                    break;
                }
                tokio::spawn(read_loop(client_id, read_half, server_tx.clone()));
            }
        }))
    }

    fn broadcast(&self, packet: Packet) {
        self.clients.broadcast(&packet);
    }

    fn send_to(&self, client_id: u32, packet: Packet) {
        if !self.clients.send_to(client_id, packet) {
            debug!("Could not queue packet for client {}", client_id);
        }
    }

    fn broadcast_lobby(&self, now: Instant) {
        self.broadcast(Packet::LobbyState(self.lobby.view(now)));
    }

    fn handle_connect(&mut self, client_id: u32, addr: SocketAddr, sender: mpsc::UnboundedSender<Packet>) {
        if !self.clients.add_client(client_id, addr, sender.clone()) {
            warn!("Refusing connection from {}: server full", addr);
            let refused = Packet::Disconnected {
                reason: "Server full".to_string(),
            };
            if sender.send(refused).is_err() {
                debug!("Connection from {} closed before refusal", addr);
            }
            return;
        }

        self.send_to(client_id, Packet::Connected { client_id });
        self.send_to(client_id, Packet::LobbyState(self.lobby.view(Instant::now())));
        // Late arrivals need the full state before any diff makes sense.
        if let Some(game) = self.game.as_ref() {
            self.send_to(client_id, Packet::GameStarted(game.snapshot()));
        }
    }

    /// Processes one client packet between ticks
    fn handle_packet(&mut self, client_id: u32, packet: Packet) {
        if !self.clients.contains(client_id) {
            debug!("Ignoring packet from unregistered client {}", client_id);
            return;
        }

        match packet {
            Packet::Join { nickname } => self.handle_join(client_id, &nickname),

            Packet::StartMoving { direction } => {
                if let Some(game) = self.game.as_mut() {
                    game.start_moving(client_id, direction);
                }
            }

            Packet::StopMoving { direction } => {
                if let Some(game) = self.game.as_mut() {
                    game.stop_moving(client_id, direction);
                }
            }

            Packet::PlaceBomb => {
                if let Some(game) = self.game.as_mut() {
                    game.place_bomb(client_id);
                }
            }

            Packet::SendChat { text } => self.handle_chat(client_id, &text),

            Packet::Disconnect => self.handle_disconnect(client_id),

            _ => {
                warn!("Unexpected packet type from client {}", client_id);
            }
        }
    }

    fn handle_join(&mut self, client_id: u32, nickname: &str) {
        let now = Instant::now();
        match self.lobby.join(client_id, nickname, now) {
            Ok(events) => {
                let accepted = self
                    .lobby
                    .participants()
                    .iter()
                    .find(|p| p.id == client_id)
                    .map(|p| p.nickname.clone());
                self.clients.set_nickname(client_id, accepted);
                self.broadcast_lobby(now);
                self.handle_lobby_events(events, now);
            }
            Err(reason) => {
                info!("Rejected join from client {}: {}", client_id, reason);
                self.send_to(client_id, Packet::Rejected { reason });
            }
        }
    }

    fn handle_chat(&self, client_id: u32, text: &str) {
        let Some(nickname) = self.clients.nickname(client_id) else {
            self.send_to(
                client_id,
                Packet::Rejected {
                    reason: RejectReason::NotJoined,
                },
            );
            return;
        };

        let chat = Packet::Chat {
            sender_id: client_id,
            nickname: nickname.to_string(),
            text: text.chars().take(MAX_CHAT_LEN).collect(),
        };
        self.broadcast(chat);
    }

    fn handle_disconnect(&mut self, client_id: u32) {
        if self.clients.remove_client(client_id).is_none() {
            return;
        }

        if let Some(game) = self.game.as_mut() {
            if game.disconnect(client_id) {
                info!("Player {} left the running game", client_id);
            }
        }

        let now = Instant::now();
        if let Some(events) = self.lobby.leave(client_id) {
            self.broadcast_lobby(now);
            self.handle_lobby_events(events, now);
        }
    }

    fn handle_lobby_events(&mut self, events: Vec<LobbyEvent>, now: Instant) {
        for event in events {
            match event {
                LobbyEvent::CountdownStarted
                | LobbyEvent::CountdownTick(_)
                | LobbyEvent::CountdownCancelled => self.broadcast_lobby(now),
                LobbyEvent::StartGame(participants) => self.start_game(participants, now),
            }
        }
    }

    fn start_game(&mut self, participants: Vec<Participant>, now: Instant) {
        let names: Vec<&str> = participants.iter().map(|p| p.nickname.as_str()).collect();
        info!("Game starting with {}", names.join(", "));

        let game = Game::new(&participants, self.config.bots, self.config.rules.clone());
        self.broadcast(Packet::GameStarted(game.snapshot()));
        self.game = Some(game);
        self.broadcast_lobby(now);
    }

    /// Runs one lobby poll and, if a game exists, one simulation tick
    fn on_tick(&mut self, now: Instant) {
        let events = self.lobby.poll(now);
        self.handle_lobby_events(events, now);

        let Some(game) = self.game.as_mut() else {
            return;
        };
        let outcome = game.tick();

        if !outcome.changes.is_empty() {
            self.broadcast(Packet::Diff {
                tick: outcome.tick,
                changes: outcome.changes,
            });
        }

        if let Some(result) = outcome.game_over {
            self.broadcast(Packet::GameOver(result));
            self.game = None;
            self.lobby.finish_game();
            self.clients.clear_nicknames();
            self.broadcast_lobby(now);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        let acceptor = self.spawn_acceptor();

        let mut tick_interval = interval(self.config.rules.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started at {} ticks per second",
            self.config.rules.tick_rate
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ClientConnected { client_id, addr, sender }) => {
                            self.handle_connect(client_id, addr, sender);
                        },
                        Some(ServerMessage::PacketReceived { client_id, packet }) => {
                            self.handle_packet(client_id, packet);
                        },
                        Some(ServerMessage::ClientDisconnected { client_id }) => {
                            self.handle_disconnect(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.on_tick(Instant::now());
                },
            }
        }

        if let Some(acceptor) = acceptor {
            acceptor.abort();
        }
        self.broadcast(Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        });
        Ok(())
    }
}

/// Forwards decoded packets until the socket closes or sends garbage
async fn read_loop(
    client_id: u32,
    mut reader: OwnedReadHalf,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        match read_packet(&mut reader).await {
            Ok(Some(packet)) => {
                let leaving = matches!(packet, Packet::Disconnect);
                if let Err(e) = server_tx.send(ServerMessage::PacketReceived { client_id, packet }) {
                    error!("Failed to send packet to main loop: {}", e);
                    return;
                }
                if leaving {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Closing client {} after bad frame: {}", client_id, e);
                break;
            }
        }
    }

    if server_tx
        .send(ServerMessage::ClientDisconnected { client_id })
        .is_err()
    {
        debug!("Main loop gone before client {} disconnect", client_id);
    }
}

/// Drains a client's outbound queue onto its socket
async fn write_loop(
    client_id: u32,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
) {
    while let Some(packet) = outbound.recv().await {
        if let Err(e) = write_packet(&mut writer, &packet).await {
            debug!("Write to client {} failed: {}", client_id, e);
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of client {} socket failed: {}", client_id, e);
    }
}
