//! Connection registry for the game server
//!
//! This module tracks every open TCP connection, joined or not:
//! - Connection lifecycle (connect, disconnect, capacity limit)
//! - The nickname a client joined the lobby with, used to label chat
//! - The outbound queue feeding each connection's writer task
//!
//! Sending never blocks the server loop. Each client owns an unbounded
//! channel drained by its own writer task, so a slow socket only delays
//! its own packets.

use log::{debug, info};
use shared::Packet;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// A single open connection
///
/// Holds:
/// - Connection metadata (ID, address, connect time)
/// - The nickname assigned on a successful join, if any
/// - The sender half of the connection's outbound queue
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Set once the client has joined the lobby
    pub nickname: Option<String>,
    sender: UnboundedSender<Packet>,
}

impl Client {
    /// Creates a client that has not joined yet
    pub fn new(id: u32, addr: SocketAddr, sender: UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            nickname: None,
            sender,
        }
    }

    /// Queues a packet for this client's writer task
    ///
    /// Returns false if the writer has already gone away, which happens when
    /// the socket closed and the disconnect has not been processed yet.
    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet).is_ok()
    }
}

/// Owns all open connections and routes outbound packets
///
/// Clients are kept ordered by ID so broadcasts reach them in connection
/// order.
pub struct ClientManager {
    /// Open connections indexed by their unique ID
    clients: BTreeMap<u32, Client>,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry with the given connection limit
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            max_clients,
        }
    }

    /// Registers a freshly accepted connection
    ///
    /// Returns false if the server is at capacity or the ID is already in
    /// use; the caller should then close the socket.
    pub fn add_client(&mut self, id: u32, addr: SocketAddr, sender: UnboundedSender<Packet>) -> bool {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&id) {
            return false;
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        true
    }

    /// Removes a client, dropping its outbound queue
    ///
    /// Dropping the sender ends the writer task once it has flushed what was
    /// already queued. Returns the removed client so the caller can inspect
    /// its nickname.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!(
            "Client {} disconnected after {:.1}s",
            client.id,
            client.connected_at.elapsed().as_secs_f32()
        );
        Some(client)
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Records the nickname a client joined with
    pub fn set_nickname(&mut self, client_id: u32, nickname: Option<String>) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.nickname = nickname;
                true
            }
            None => false,
        }
    }

    pub fn nickname(&self, client_id: u32) -> Option<&str> {
        self.clients.get(&client_id)?.nickname.as_deref()
    }

    /// Clears every stored nickname, used when a game ends and the lobby
    /// starts over empty.
    pub fn clear_nicknames(&mut self) {
        for client in self.clients.values_mut() {
            client.nickname = None;
        }
    }

    /// Queues a packet for one client
    ///
    /// Returns false if the client is unknown or its writer is gone.
    pub fn send_to(&self, client_id: u32, packet: Packet) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(packet),
            None => {
                debug!("Dropping packet for unknown client {}", client_id);
                false
            }
        }
    }

    /// Queues a packet for every open connection
    ///
    /// Returns how many queues accepted it.
    pub fn broadcast(&self, packet: &Packet) -> usize {
        self.clients
            .values()
            .filter(|client| client.send(packet.clone()))
            .count()
    }

    /// IDs of all open connections in ascending order
    #[cfg(test)]
    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if nobody is connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn channel() -> (UnboundedSender<Packet>, UnboundedReceiver<Packet>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = channel();
        let client = Client::new(1, test_addr(), tx);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert!(client.nickname.is_none());
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(manager.add_client(1, test_addr(), tx1));
        assert!(!manager.add_client(2, test_addr2(), tx2));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_add_duplicate_id() {
        let mut manager = ClientManager::new(4);
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(manager.add_client(7, test_addr(), tx1));
        assert!(!manager.add_client(7, test_addr2(), tx2));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = channel();
        manager.add_client(1, test_addr(), tx);
        manager.set_nickname(1, Some("alice".to_string()));

        let removed = manager.remove_client(1).unwrap();
        assert_eq!(removed.nickname.as_deref(), Some("alice"));
        assert!(manager.is_empty());
        assert!(manager.remove_client(1).is_none());
    }

    #[test]
    fn test_nicknames() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = channel();
        manager.add_client(1, test_addr(), tx);

        assert_eq!(manager.nickname(1), None);
        assert!(manager.set_nickname(1, Some("bob".to_string())));
        assert_eq!(manager.nickname(1), Some("bob"));
        assert!(!manager.set_nickname(99, Some("ghost".to_string())));

        manager.clear_nicknames();
        assert_eq!(manager.nickname(1), None);
    }

    #[test]
    fn test_send_to() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = channel();
        manager.add_client(1, test_addr(), tx);

        assert!(manager.send_to(1, Packet::Connected { client_id: 1 }));
        assert!(!manager.send_to(2, Packet::PlaceBomb));
        assert_eq!(rx.try_recv().unwrap(), Packet::Connected { client_id: 1 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_skips_closed_queues() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = channel();
        let (tx2, rx2) = channel();
        manager.add_client(1, test_addr(), tx1);
        manager.add_client(2, test_addr2(), tx2);
        drop(rx2);

        let packet = Packet::Diff {
            tick: 3,
            changes: vec![],
        };
        assert_eq!(manager.broadcast(&packet), 1);
        assert_eq!(rx1.try_recv().unwrap(), packet);
        assert_eq!(manager.client_ids(), vec![1, 2]);
    }
}
