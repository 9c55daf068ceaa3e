//! # Packet Definitions
//!
//! Wire types for the game-client channel described in the transport
//! session layer: authentication, per-tick input, authoritative
//! snapshots, and the handful of request/response message kinds a
//! connected client needs beyond raw movement.
//!
//! ## Zero-Allocation Design
//!
//! Fixed-size packet bodies are `Copy`/`Pod` to enable pre-allocated
//! buffers and zero-copy deserialization. Messages with a genuinely
//! variable payload (chat text, action metadata, chunk bytes) carry a
//! bounded inline buffer plus an explicit length rather than a `Vec`,
//! so the whole protocol stays allocation-free on the hot path.

use bytemuck::{Pod, Zeroable};

/// Packet header - present in every packet.
///
/// Total size: 8 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PacketHeader {
    /// Sequence number of this packet.
    pub sequence: u16,
    /// Last received sequence number from remote.
    pub ack: u16,
    /// Bitmask of received packets before `ack` (ack-1 through ack-32).
    pub ack_bits: u32,
}

impl PacketHeader {
    /// Creates a new packet header.
    #[inline]
    #[must_use]
    pub const fn new(sequence: u16, ack: u16, ack_bits: u32) -> Self {
        Self { sequence, ack, ack_bits }
    }

    /// Size of the header in bytes.
    pub const SIZE: usize = 8;
}

/// Types of packets on the game-client channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Client -> Server: credentials or pre-issued token.
    AuthRequest = 0,
    /// Server -> Client: session token, player id, capability set.
    AuthResponse = 1,
    /// Client -> Server: movement/action input for a tick.
    ClientInput = 2,
    /// Server -> Client: authoritative world snapshot for a tick.
    WorldSnapshot = 3,
    /// Server -> Client: a single entity's position/facing changed.
    EntityMove = 4,
    /// Server -> Client: a single block cell changed.
    BlockUpdate = 5,
    /// Client -> Server: request the contents of a chunk.
    ChunkRequest = 6,
    /// Server -> Client: chunk contents (possibly compressed).
    ChunkData = 7,
    /// Bidirectional: round-trip timing probe.
    Ping = 8,
    /// Bidirectional: round-trip timing reply.
    Pong = 9,
    /// Bidirectional: a chat message.
    Chat = 10,
    /// Client -> Server: one of the nine game actions.
    EntityAction = 11,
    /// Server -> Client: result of a previously sent action.
    EntityActionResponse = 12,
    /// Server -> Client: a typed error in place of the expected reply.
    Error = 13,
}

/// The nine action kinds the game action handler accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionKind {
    /// Interact with a block or entity.
    Interact = 0,
    /// Attack a target entity.
    Attack = 1,
    /// Use the currently held item.
    UseItem = 2,
    /// Pick up a nearby item entity.
    Pickup = 3,
    /// Drop an inventory item.
    Drop = 4,
    /// Place a block.
    BuildPlace = 5,
    /// Break a block.
    BuildBreak = 6,
    /// Play an emote.
    Emote = 7,
    /// Respawn after death.
    Respawn = 8,
}

impl ActionKind {
    /// Decodes a wire byte into an action kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Interact),
            1 => Some(Self::Attack),
            2 => Some(Self::UseItem),
            3 => Some(Self::Pickup),
            4 => Some(Self::Drop),
            5 => Some(Self::BuildPlace),
            6 => Some(Self::BuildBreak),
            7 => Some(Self::Emote),
            8 => Some(Self::Respawn),
            _ => None,
        }
    }
}

/// Client -> Server: credentials or a pre-issued session token.
///
/// Size: 36 bytes.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct AuthRequest {
    /// Pre-issued token, zero-padded if shorter.
    pub token: [u8; 32],
    /// Length of the meaningful prefix of `token`.
    pub token_len: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
}

impl AuthRequest {
    /// Size in bytes.
    pub const SIZE: usize = 36;
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest").field("token_len", &self.token_len).finish()
    }
}

/// Server -> Client: session accepted, carrying the enabled capability set.
///
/// Size: 16 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct AuthResponse {
    /// Assigned player entity id (lower 32 bits).
    pub player_id: u32,
    /// Bitmask of enabled capabilities.
    pub capabilities: u32,
    /// 0 = accepted, nonzero = rejected (see `ActionError`-style codes).
    pub result: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
    /// Server tick at acceptance time.
    pub tick: u32,
}

impl AuthResponse {
    /// Size in bytes.
    pub const SIZE: usize = 16;
}

/// Client -> Server: movement + action input for a single tick.
///
/// Size: 20 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ClientInput {
    /// Client's local monotonically increasing input sequence.
    pub input_sequence: u32,
    /// Client's predicted tick this input targets.
    pub tick: u32,
    /// Movement along x, normalized and packed to i8.
    pub move_x: i8,
    /// Movement along y, normalized and packed to i8.
    pub move_y: i8,
    /// Four-way facing (0 = +y, 1 = +x, 2 = -y, 3 = -x).
    pub facing: u8,
    /// Input flags (sprint, crouch, etc).
    pub flags: u8,
    /// Action kind requested this tick, or `NONE_ACTION`.
    pub action: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
    /// Client-local timestamp in ms, for RTT estimation.
    pub timestamp: u32,
}

impl ClientInput {
    /// Size in bytes.
    pub const SIZE: usize = 20;

    /// Sentinel meaning "no action this tick".
    pub const NONE_ACTION: u8 = 0xFF;

    /// Input flag: sprint.
    pub const FLAG_SPRINT: u8 = 1 << 0;
    /// Input flag: crouch.
    pub const FLAG_CROUCH: u8 = 1 << 1;

    /// Creates a bare movement-only input.
    #[inline]
    #[must_use]
    pub const fn new(input_sequence: u32, tick: u32) -> Self {
        Self {
            input_sequence,
            tick,
            move_x: 0,
            move_y: 0,
            facing: 0,
            flags: 0,
            action: Self::NONE_ACTION,
            _padding: [0; 3],
            timestamp: 0,
        }
    }

    /// Returns the requested action kind, if any.
    #[inline]
    #[must_use]
    pub const fn requested_action(&self) -> Option<ActionKind> {
        if self.action == Self::NONE_ACTION {
            None
        } else {
            ActionKind::from_u8(self.action)
        }
    }
}

/// Entity state as carried in a snapshot.
///
/// Size: 24 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct EntityState {
    /// Entity id (lower 32 bits).
    pub entity_id: u32,
    /// Block-layer the entity currently occupies.
    pub layer: u8,
    /// Four-way facing.
    pub facing: u8,
    /// Health, saturating at 65535 fixed-point units.
    pub health: u16,
    /// Position x (world units, fixed-point *256).
    pub pos_x: i32,
    /// Position y (world units, fixed-point *256).
    pub pos_y: i32,
    /// Input sequence this position was reconciled against (0 for
    /// entities other than the receiving player's own).
    pub ack_input_sequence: u32,
    /// State flags (alive, errored, etc).
    pub flags: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
}

impl EntityState {
    /// Size in bytes.
    pub const SIZE: usize = 24;

    /// Flag: entity is alive.
    pub const FLAG_ALIVE: u8 = 1 << 0;
}

/// A single block-cell change, as carried in a snapshot or pushed
/// standalone between snapshots.
///
/// Size: 12 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct BlockUpdate {
    /// Layer the cell belongs to.
    pub layer: u8,
    /// Padding for alignment.
    pub _padding: u8,
    /// New block id (0 = air).
    pub block_id: u16,
    /// World x coordinate.
    pub x: i32,
    /// World y coordinate.
    pub y: i32,
}

impl BlockUpdate {
    /// Size in bytes.
    pub const SIZE: usize = 12;
}

/// Authoritative world snapshot for one tick.
///
/// Maximum entities and block updates are bounded so the packet stays
/// under a single datagram; larger changesets span multiple snapshots.
#[derive(Clone, Copy, Debug)]
pub struct WorldSnapshot {
    /// Server tick this snapshot represents.
    pub tick: u32,
    /// Number of valid entries in `entities`.
    pub entity_count: u16,
    /// Number of valid entries in `block_updates`.
    pub block_update_count: u16,
    /// Entity states (pre-allocated array).
    pub entities: [EntityState; Self::MAX_ENTITIES],
    /// Block changes since the client's last acknowledged tick.
    pub block_updates: [BlockUpdate; Self::MAX_BLOCK_UPDATES],
}

impl WorldSnapshot {
    /// Maximum entities in a single snapshot packet.
    pub const MAX_ENTITIES: usize = 48;
    /// Maximum block updates in a single snapshot packet.
    pub const MAX_BLOCK_UPDATES: usize = 24;

    /// Creates an empty snapshot.
    #[must_use]
    pub const fn empty(tick: u32) -> Self {
        Self {
            tick,
            entity_count: 0,
            block_update_count: 0,
            entities: [EntityState {
                entity_id: 0,
                layer: 0,
                facing: 0,
                health: 0,
                pos_x: 0,
                pos_y: 0,
                ack_input_sequence: 0,
                flags: 0,
                _padding: [0; 3],
            }; Self::MAX_ENTITIES],
            block_updates: [BlockUpdate { layer: 0, _padding: 0, block_id: 0, x: 0, y: 0 }; Self::MAX_BLOCK_UPDATES],
        }
    }

    /// Adds an entity to the snapshot. Returns false if full.
    #[inline]
    pub fn add_entity(&mut self, state: EntityState) -> bool {
        if self.entity_count as usize >= Self::MAX_ENTITIES {
            return false;
        }
        self.entities[self.entity_count as usize] = state;
        self.entity_count += 1;
        true
    }

    /// Adds a block update to the snapshot. Returns false if full.
    #[inline]
    pub fn add_block_update(&mut self, update: BlockUpdate) -> bool {
        if self.block_update_count as usize >= Self::MAX_BLOCK_UPDATES {
            return false;
        }
        self.block_updates[self.block_update_count as usize] = update;
        self.block_update_count += 1;
        true
    }

    /// Returns a slice of valid entities.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityState] {
        &self.entities[..self.entity_count as usize]
    }

    /// Returns a slice of valid block updates.
    #[inline]
    #[must_use]
    pub fn block_updates(&self) -> &[BlockUpdate] {
        &self.block_updates[..self.block_update_count as usize]
    }
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self::empty(0)
    }
}

/// Maximum inline payload length for variable-sized messages (chat
/// text, action metadata, chunk bytes, error context).
pub const MAX_VARIABLE_PAYLOAD: usize = 1024;

/// Client -> Server or Server -> Client: a chat message.
#[derive(Clone, Copy)]
pub struct Chat {
    /// Sending player id (0 for a server-originated system message).
    pub player_id: u32,
    /// Length of the meaningful prefix of `text`.
    pub text_len: u16,
    /// UTF-8 text, zero-padded.
    pub text: [u8; MAX_VARIABLE_PAYLOAD],
}

impl Chat {
    /// Builds a chat message, truncating text that exceeds the inline buffer.
    #[must_use]
    pub fn new(player_id: u32, text: &str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_VARIABLE_PAYLOAD);
        let mut buf = [0u8; MAX_VARIABLE_PAYLOAD];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self { player_id, text_len: len as u16, text: buf }
    }

    /// Returns the text as a `&str`, replacing invalid UTF-8 with the
    /// standard replacement character.
    #[must_use]
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.text[..self.text_len as usize])
    }
}

/// Client -> Server: one of the nine game actions (§ action handler).
#[derive(Clone, Copy)]
pub struct EntityAction {
    /// Which of the nine actions this is.
    pub kind: ActionKind,
    /// Target layer (for block-addressed actions).
    pub target_layer: u8,
    /// Target world x.
    pub target_x: i32,
    /// Target world y.
    pub target_y: i32,
    /// Target entity id (for entity-addressed actions, 0 if none).
    pub target_entity: u32,
    /// Length of the meaningful prefix of `metadata`.
    pub metadata_len: u16,
    /// Action-specific metadata payload (e.g. placed block id, item id).
    pub metadata: [u8; MAX_VARIABLE_PAYLOAD],
}

/// Server -> Client: result of a previously submitted `EntityAction`.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct EntityActionResponse {
    /// Echoes the input sequence the action was attached to.
    pub input_sequence: u32,
    /// 0 = success, nonzero = an `ActionError` subkind.
    pub result: u8,
    /// Padding for alignment.
    pub _padding: [u8; 3],
}

/// Bidirectional: round-trip timing probe.
///
/// Size: 8 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Ping {
    /// Client-local timestamp in ms.
    pub client_time_ms: u64,
}

/// Bidirectional: round-trip timing reply, echoing the probe.
///
/// Size: 16 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Pong {
    /// Echoed client-local timestamp in ms.
    pub client_time_ms: u64,
    /// Server tick at reply time.
    pub server_tick: u32,
    /// Padding for alignment.
    pub _padding: u32,
}

/// Request the contents of a single chunk.
///
/// Size: 8 bytes.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ChunkRequest {
    /// Chunk x coordinate.
    pub cx: i32,
    /// Chunk y coordinate.
    pub cy: i32,
}

/// Server -> Client: a chunk's compressed contents.
#[derive(Clone, Copy)]
pub struct ChunkData {
    /// Chunk x coordinate.
    pub cx: i32,
    /// Chunk y coordinate.
    pub cy: i32,
    /// Chunk version at time of send.
    pub version: u32,
    /// Length of the meaningful prefix of `payload`.
    pub payload_len: u16,
    /// LZ4-compressed chunk bytes.
    pub payload: [u8; MAX_VARIABLE_PAYLOAD],
}

/// Server -> Client: a typed error in place of the expected reply.
#[derive(Clone, Copy)]
pub struct ErrorMessage {
    /// Numeric error code (mirrors the `NodeError`/`ActionError` taxonomy).
    pub code: u16,
    /// Length of the meaningful prefix of `context`.
    pub context_len: u16,
    /// Human-readable context.
    pub context: [u8; MAX_VARIABLE_PAYLOAD],
}

/// A decoded packet of any kind, paired with its header.
#[derive(Clone, Copy)]
pub enum Packet {
    /// Authentication request.
    AuthRequest(PacketHeader, AuthRequest),
    /// Authentication response.
    AuthResponse(PacketHeader, AuthResponse),
    /// Per-tick client input.
    ClientInput(PacketHeader, ClientInput),
    /// Authoritative world snapshot.
    WorldSnapshot(PacketHeader, WorldSnapshot),
    /// Standalone entity move (outside a full snapshot).
    EntityMove(PacketHeader, EntityState),
    /// Standalone block update (outside a full snapshot).
    BlockUpdate(PacketHeader, BlockUpdate),
    /// Chunk content request.
    ChunkRequest(PacketHeader, ChunkRequest),
    /// Chunk content reply.
    ChunkData(PacketHeader, ChunkData),
    /// Timing probe.
    Ping(PacketHeader, Ping),
    /// Timing reply.
    Pong(PacketHeader, Pong),
    /// Chat message.
    Chat(PacketHeader, Chat),
    /// Game action request.
    EntityAction(PacketHeader, EntityAction),
    /// Game action result.
    EntityActionResponse(PacketHeader, EntityActionResponse),
    /// Typed error.
    Error(PacketHeader, ErrorMessage),
}

impl Packet {
    /// Returns the packet type.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::AuthRequest(..) => PacketType::AuthRequest,
            Self::AuthResponse(..) => PacketType::AuthResponse,
            Self::ClientInput(..) => PacketType::ClientInput,
            Self::WorldSnapshot(..) => PacketType::WorldSnapshot,
            Self::EntityMove(..) => PacketType::EntityMove,
            Self::BlockUpdate(..) => PacketType::BlockUpdate,
            Self::ChunkRequest(..) => PacketType::ChunkRequest,
            Self::ChunkData(..) => PacketType::ChunkData,
            Self::Ping(..) => PacketType::Ping,
            Self::Pong(..) => PacketType::Pong,
            Self::Chat(..) => PacketType::Chat,
            Self::EntityAction(..) => PacketType::EntityAction,
            Self::EntityActionResponse(..) => PacketType::EntityActionResponse,
            Self::Error(..) => PacketType::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_packet_sizes() {
        assert_eq!(std::mem::size_of::<PacketHeader>(), PacketHeader::SIZE);
        assert_eq!(std::mem::size_of::<AuthRequest>(), AuthRequest::SIZE);
        assert_eq!(std::mem::size_of::<AuthResponse>(), AuthResponse::SIZE);
        assert_eq!(std::mem::size_of::<ClientInput>(), ClientInput::SIZE);
        assert_eq!(std::mem::size_of::<EntityState>(), EntityState::SIZE);
        assert_eq!(std::mem::size_of::<BlockUpdate>(), BlockUpdate::SIZE);
    }

    #[test]
    fn test_snapshot_add_entity_and_block_update() {
        let mut snapshot = WorldSnapshot::empty(1);
        for i in 0..WorldSnapshot::MAX_ENTITIES {
            let state = EntityState { entity_id: i as u32, flags: EntityState::FLAG_ALIVE, ..Default::default() };
            assert!(snapshot.add_entity(state));
        }
        assert!(!snapshot.add_entity(EntityState::default()));

        for i in 0..WorldSnapshot::MAX_BLOCK_UPDATES {
            let update = BlockUpdate { x: i as i32, ..Default::default() };
            assert!(snapshot.add_block_update(update));
        }
        assert!(!snapshot.add_block_update(BlockUpdate::default()));
    }

    #[test]
    fn test_client_input_action_decoding() {
        let mut input = ClientInput::new(1, 10);
        assert!(input.requested_action().is_none());
        input.action = ActionKind::BuildPlace as u8;
        assert_eq!(input.requested_action(), Some(ActionKind::BuildPlace));
    }

    #[test]
    fn test_chat_roundtrip_truncates_oversize_text() {
        let long = "x".repeat(MAX_VARIABLE_PAYLOAD + 10);
        let chat = Chat::new(7, &long);
        assert_eq!(chat.text_len as usize, MAX_VARIABLE_PAYLOAD);
        assert_eq!(chat.as_str().len(), MAX_VARIABLE_PAYLOAD);
    }
}
