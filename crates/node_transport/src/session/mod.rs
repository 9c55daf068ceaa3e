//! # Transport Session Layer
//!
//! The authoritative game-client channel: session admission, per-session
//! input intake, and per-tick snapshot broadcast.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SESSION MANAGER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Transport I/O│  │ Tick Driver  │  │ Broadcast    │       │
//! │  │ (async tasks)│──│ (owned by    │──│ (per-session │       │
//! │  │              │  │  node crate) │  │  send queue) │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                 │                │
//! │         └────────────────┼─────────────────┘                │
//! │                          │                                   │
//! │              ┌───────────▼───────────┐                      │
//! │              │   Session Table       │                      │
//! │              │  - connection state   │                      │
//! │              │  - input history      │                      │
//! │              │  - idle reaping       │                      │
//! │              └───────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod connection;
mod state;

pub use connection::{ClientConnection, ConnectionId, ConnectionState, IDLE_TIMEOUT};
pub use state::{SessionError, SessionTable, MAX_SESSIONS, MAX_SESSIONS_PER_IP};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::protocol::{
    AuthRequest, AuthResponse, ClientInput, Packet, PacketDeserializer, PacketHeader, PacketSerializer, WorldSnapshot,
    MAX_BUFFER_SIZE,
};

/// Session manager configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Server tick rate (updates per second).
    pub tick_rate: u32,
    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
    /// UDP port to bind.
    pub port: u16,
    /// Address to bind to.
    pub bind_address: SocketAddr,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_sessions: MAX_SESSIONS,
            port: 7777,
            bind_address: "0.0.0.0:7777".parse().expect("valid address"),
        }
    }
}

/// Event handed from the transport I/O task to the session manager.
#[derive(Clone, Debug)]
pub enum NetworkEvent {
    /// A datagram was received from `addr`.
    PacketReceived {
        /// Source address.
        addr: SocketAddr,
        /// Packet bytes.
        data: [u8; MAX_BUFFER_SIZE],
        /// Length of valid data in `data`.
        len: usize,
    },
    /// A session was admitted.
    ClientConnected(SocketAddr),
    /// A session was torn down.
    ClientDisconnected(ConnectionId),
}

/// Command handed from the session manager to the transport I/O task.
#[derive(Clone, Debug)]
pub enum NetworkCommand {
    /// Send a datagram to one session.
    Send {
        /// Target address.
        addr: SocketAddr,
        /// Packet bytes.
        data: [u8; MAX_BUFFER_SIZE],
        /// Length of valid data in `data`.
        len: usize,
    },
    /// Send a datagram to every active session.
    Broadcast {
        /// Packet bytes.
        data: [u8; MAX_BUFFER_SIZE],
        /// Length of valid data in `data`.
        len: usize,
    },
    /// Stop accepting new sessions and drain.
    Shutdown,
}

/// The transport session manager for one regional node.
pub struct SessionManager {
    config: SessionConfig,
    table: SessionTable,
    event_rx: Receiver<NetworkEvent>,
    event_tx: Sender<NetworkEvent>,
    command_tx: Sender<NetworkCommand>,
    command_rx: Receiver<NetworkCommand>,
    tick: AtomicU64,
}

impl SessionManager {
    /// Creates a new session manager bound to the given configuration.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let (event_tx, event_rx) = bounded(10_000);
        let (command_tx, command_rx) = bounded(10_000);

        Self {
            table: SessionTable::new(config.max_sessions),
            config,
            event_rx,
            event_tx,
            command_tx,
            command_rx,
            tick: AtomicU64::new(0),
        }
    }

    /// Handle used by the transport I/O task to push inbound events.
    #[must_use]
    pub fn event_sender(&self) -> Sender<NetworkEvent> {
        self.event_tx.clone()
    }

    /// Handle used by the transport I/O task to pull outbound commands.
    #[must_use]
    pub fn command_receiver(&self) -> Receiver<NetworkCommand> {
        self.command_rx.clone()
    }

    /// Returns the manager's configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current tick number.
    #[inline]
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Returns the number of active sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.table.active_count()
    }

    /// Returns a reference to the session table.
    #[inline]
    #[must_use]
    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    /// Returns a mutable reference to the session table.
    #[inline]
    pub fn table_mut(&mut self) -> &mut SessionTable {
        &mut self.table
    }

    /// Drains pending network events, applying each to the session table.
    /// Returns the client inputs ready for this tick's action dispatch,
    /// and the auth requests from not-yet-admitted addresses, for the
    /// caller to turn into an admission decision (spawn an entity, then
    /// [`admit`](Self::admit) and [`reply_auth`](Self::reply_auth)).
    pub fn drain_events(&mut self) -> (Vec<(ConnectionId, ClientInput)>, Vec<(SocketAddr, AuthRequest)>) {
        let mut ready_inputs = Vec::new();
        let mut pending_auth = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event, &mut ready_inputs, &mut pending_auth);
        }
        (ready_inputs, pending_auth)
    }

    fn handle_event(
        &mut self,
        event: NetworkEvent,
        ready_inputs: &mut Vec<(ConnectionId, ClientInput)>,
        pending_auth: &mut Vec<(SocketAddr, AuthRequest)>,
    ) {
        match event {
            NetworkEvent::PacketReceived { addr, data, len } => {
                self.handle_packet(addr, &data[..len], ready_inputs, pending_auth);
            }
            NetworkEvent::ClientConnected(addr) => {
                tracing::info!(%addr, "session requested connection before auth handshake");
            }
            NetworkEvent::ClientDisconnected(id) => {
                self.table.remove_client(id);
                tracing::info!(session_id = id.0, "session disconnected");
            }
        }
    }

    fn handle_packet(
        &mut self,
        addr: SocketAddr,
        data: &[u8],
        ready_inputs: &mut Vec<(ConnectionId, ClientInput)>,
        pending_auth: &mut Vec<(SocketAddr, AuthRequest)>,
    ) {
        let mut deserializer = PacketDeserializer::new(data);
        let Some(packet) = deserializer.deserialize() else {
            tracing::warn!(%addr, "dropped undecodable packet");
            return;
        };

        match packet {
            Packet::AuthRequest(_header, req) => {
                if self.table.find_by_addr(addr).is_some() {
                    tracing::debug!(%addr, "ignoring auth request from an already-admitted address");
                } else {
                    pending_auth.push((addr, req));
                }
            }
            Packet::ClientInput(header, input) => {
                if let Some(id) = self.table.find_by_addr(addr) {
                    if let Some(client) = self.table.get_mut(id) {
                        client.record_recv(header.sequence);
                        client.update_ack(header.ack, header.ack_bits);
                        client.add_input(input);
                        ready_inputs.push((id, input));
                    }
                }
            }
            Packet::Ping(header, ping) => {
                if let Some(client) = self.table.find_by_addr_mut(addr) {
                    client.record_recv(header.sequence);
                }
                self.reply_pong(addr, ping.client_time_ms);
            }
            _ => {
                // Other packet types are either server-originated or handled
                // by higher layers once a session exists.
            }
        }
    }

    /// Admits a new session for `addr` owning `entity_id`.
    pub fn admit(&mut self, addr: SocketAddr, entity_id: u32) -> Result<ConnectionId, SessionError> {
        let id = self.table.add_client(addr, entity_id)?;
        tracing::info!(%addr, session_id = id.0, entity_id, "session admitted");
        Ok(id)
    }

    /// Sends an `AuthResponse` to `addr`, completing the handshake
    /// started by its `AuthRequest`. Called whether admission succeeded
    /// or was rejected; `response.result` carries the outcome.
    pub fn reply_auth(&self, addr: SocketAddr, response: AuthResponse) {
        let mut serializer = PacketSerializer::new();
        let header = PacketHeader::new(0, 0, 0);

        if serializer.serialize_auth_response(&header, &response) {
            let mut data = [0u8; MAX_BUFFER_SIZE];
            data[..serializer.len()].copy_from_slice(serializer.as_slice());
            let _ = self.command_tx.try_send(NetworkCommand::Send { addr, data, len: serializer.len() });
        }
    }

    /// Reaps sessions idle past the timeout; call once per tick.
    pub fn reap_idle_sessions(&mut self) -> Vec<ConnectionId> {
        let reaped = self.table.reap_idle();
        for id in &reaped {
            tracing::info!(session_id = id.0, "session idle-timed-out");
        }
        reaped
    }

    /// Broadcasts a world snapshot to every active session.
    pub fn broadcast_snapshot(&self, snapshot: &WorldSnapshot) {
        let mut serializer = PacketSerializer::new();
        let header = PacketHeader::new(snapshot.tick as u16, 0, 0);

        if serializer.serialize_world_snapshot(&header, snapshot) {
            let mut data = [0u8; MAX_BUFFER_SIZE];
            data[..serializer.len()].copy_from_slice(serializer.as_slice());

            let _ = self.command_tx.try_send(NetworkCommand::Broadcast { data, len: serializer.len() });
        }
    }

    fn reply_pong(&self, addr: SocketAddr, client_time_ms: u64) {
        use crate::protocol::Pong;

        let mut serializer = PacketSerializer::new();
        let header = PacketHeader::new(0, 0, 0);
        let pong = Pong { client_time_ms, server_tick: self.current_tick() as u32, _padding: 0 };

        if serializer.serialize_pong(&header, &pong) {
            let mut data = [0u8; MAX_BUFFER_SIZE];
            data[..serializer.len()].copy_from_slice(serializer.as_slice());
            let _ = self.command_tx.try_send(NetworkCommand::Send { addr, data, len: serializer.len() });
        }
    }

    /// Advances the session manager's own tick counter. The world tick
    /// itself lives in the node's game loop; this counter is used only
    /// to stamp outgoing packets from this layer.
    pub fn advance_tick(&self) {
        self.tick.fetch_add(1, Ordering::Relaxed);
    }

    /// Sends a raw command to the transport I/O task.
    #[inline]
    pub fn send_command(&self, command: NetworkCommand) -> bool {
        self.command_tx.try_send(command).is_ok()
    }

    /// Initiates shutdown: stop admitting sessions and flush the command queue.
    pub fn shutdown(&self) {
        let _ = self.command_tx.try_send(NetworkCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_manager_creation() {
        let manager = SessionManager::new(SessionConfig::default());
        assert_eq!(manager.current_tick(), 0);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_admit_and_reap() {
        let mut manager = SessionManager::new(SessionConfig::default());
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let id = manager.admit(addr, 7).unwrap();
        assert_eq!(manager.session_count(), 1);
        assert!(manager.table().get(id).is_some());
    }

    #[test]
    fn test_per_address_limit_surfaces_as_session_error() {
        let mut manager = SessionManager::new(SessionConfig::default());
        for i in 0..MAX_SESSIONS_PER_IP {
            let addr: SocketAddr = format!("10.1.1.1:{}", 5000 + i).parse().unwrap();
            assert!(manager.admit(addr, i as u32).is_ok());
        }
        let addr: SocketAddr = "10.1.1.1:9999".parse().unwrap();
        assert_eq!(manager.admit(addr, 99), Err(SessionError::PerAddressLimitExceeded));
    }
}
