//! # Game-Client Protocol
//!
//! Binary packet definitions for the transport session layer.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Sequence (2) │ Ack (2) │ AckBits (4)                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (variable, max MAX_BUFFER_SIZE)                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fixed-size bodies are `Pod` for zero-copy handling; the handful of
//! messages with real variable-length content (chat, action metadata,
//! chunk bytes) are length-prefixed and bound-checked on read.

mod compression;
mod packets;
mod serialization;

pub use compression::{BitPacker, DeltaCompressor};
pub use packets::{
    ActionKind, AuthRequest, AuthResponse, BlockUpdate, Chat, ChunkData, ChunkRequest,
    ClientInput, EntityAction, EntityActionResponse, EntityState, ErrorMessage, Packet,
    PacketHeader, PacketType, Ping, Pong, WorldSnapshot, MAX_VARIABLE_PAYLOAD,
};
pub use serialization::{AckBitfield, PacketDeserializer, PacketSerializer, SequenceNumber, MAX_BUFFER_SIZE};
