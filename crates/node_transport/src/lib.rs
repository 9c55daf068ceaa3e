//! # Transport Session Layer
//!
//! The regional node's game-client channel: authentication, per-tick
//! input intake, snapshot broadcast, and the session bookkeeping that
//! admits, tracks, and reaps client connections.
//!
//! ## Architecture
//!
//! - **Protocol**: compact binary wire types, `Pod` where fixed-size,
//!   length-prefixed and bound-checked where genuinely variable
//! - **Transport**: async UDP, unreliable-unordered by default with an
//!   opt-in reliability layer for the handful of packets that need it
//! - **Session**: per-connection state, idle reaping, session-count and
//!   per-source-address admission limits
//! - **Snapshot**: per-session delta-bounded world snapshots built from
//!   the simulator's authoritative state
//! - **Prediction**: input-sequence tracking so every outgoing entity
//!   state carries the `ack_input_sequence` the client reconciles against
//!
//! ## Security Model
//!
//! ```text
//! CLIENT                           SERVER
//!   |                                 |
//!   |--- ClientInput ---------------->|
//!   |                                 | <- Server validates & applies
//!   |<-- WorldSnapshot (authoritative)|
//!   |                                 |
//! ```
//!
//! The client never determines outcomes; every action is validated and
//! applied server-side.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod protocol;
pub mod prediction;
pub mod session;
pub mod snapshot;
pub mod transport;

pub use prediction::InputSequencer;
pub use protocol::{
    AckBitfield, ActionKind, AuthRequest, AuthResponse, BlockUpdate, ClientInput, EntityState,
    Packet, PacketHeader, PacketType, SequenceNumber, WorldSnapshot,
};
pub use session::{
    ClientConnection, ConnectionId, ConnectionState, NetworkCommand, NetworkEvent, SessionConfig,
    SessionError, SessionManager, SessionTable,
};
pub use snapshot::{SnapshotBuilder, SnapshotHistory};
pub use transport::{ReliabilityLayer, TransportStats, UdpTransport};

/// Regional node tick rate (updates per second).
///
/// At 60Hz, each tick is ~16.67ms.
pub const NODE_TICK_RATE: u32 = 60;

/// Server tick duration in microseconds (60Hz = 16,666 μs).
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / NODE_TICK_RATE as u64;
