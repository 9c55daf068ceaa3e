//! # Packet Serialization
//!
//! Zero-allocation serialization for network packets: a pre-allocated
//! buffer is written/read directly, with Pod types copied in one shot
//! and variable-length payloads framed by an explicit length prefix
//! bounded by `MAX_VARIABLE_PAYLOAD`. A receiver refuses to trust a
//! declared length past that bound before touching the buffer.

use bytemuck::{bytes_of, Pod};

use super::packets::*;

/// Sequence number type alias.
pub type SequenceNumber = u16;

/// Acknowledgment bitfield type alias.
pub type AckBitfield = u32;

/// Maximum packet buffer size (keeps a single packet under common MTUs).
pub const MAX_BUFFER_SIZE: usize = 1400;

/// Packet serializer - writes packets to a pre-allocated buffer.
pub struct PacketSerializer {
    buffer: [u8; MAX_BUFFER_SIZE],
    position: usize,
}

impl PacketSerializer {
    /// Creates a new serializer with a fresh buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: [0u8; MAX_BUFFER_SIZE], position: 0 }
    }

    /// Resets the serializer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> bool {
        if self.position >= MAX_BUFFER_SIZE {
            return false;
        }
        self.buffer[self.position] = value;
        self.position += 1;
        true
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> bool {
        if self.position + 2 > MAX_BUFFER_SIZE {
            return false;
        }
        self.buffer[self.position..self.position + 2].copy_from_slice(&value.to_le_bytes());
        self.position += 2;
        true
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> bool {
        let bytes = bytes_of(value);
        if self.position + bytes.len() > MAX_BUFFER_SIZE {
            return false;
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        true
    }

    /// Writes a length-prefixed variable payload.
    #[inline]
    pub fn write_variable(&mut self, data: &[u8]) -> bool {
        if data.len() > u16::MAX as usize || !self.write_u16(data.len() as u16) {
            return false;
        }
        if self.position + data.len() > MAX_BUFFER_SIZE {
            return false;
        }
        self.buffer[self.position..self.position + data.len()].copy_from_slice(data);
        self.position += data.len();
        true
    }

    /// Writes a packet header.
    #[inline]
    pub fn write_header(&mut self, header: &PacketHeader) -> bool {
        self.write_pod(header)
    }

    /// Serializes a complete client-input packet.
    pub fn serialize_client_input(&mut self, header: &PacketHeader, input: &ClientInput) -> bool {
        self.reset();
        self.write_u8(PacketType::ClientInput as u8) && self.write_header(header) && self.write_pod(input)
    }

    /// Serializes a world snapshot packet.
    pub fn serialize_world_snapshot(&mut self, header: &PacketHeader, snapshot: &WorldSnapshot) -> bool {
        self.reset();
        if !self.write_u8(PacketType::WorldSnapshot as u8) || !self.write_header(header) {
            return false;
        }
        if !self.write_pod(&snapshot.tick) || !self.write_pod(&snapshot.entity_count) || !self.write_pod(&snapshot.block_update_count) {
            return false;
        }
        for entity in snapshot.entities() {
            if !self.write_pod(entity) {
                return false;
            }
        }
        for update in snapshot.block_updates() {
            if !self.write_pod(update) {
                return false;
            }
        }
        true
    }

    /// Serializes an auth request.
    pub fn serialize_auth_request(&mut self, header: &PacketHeader, req: &AuthRequest) -> bool {
        self.reset();
        self.write_u8(PacketType::AuthRequest as u8) && self.write_header(header) && self.write_pod(req)
    }

    /// Serializes an auth response.
    pub fn serialize_auth_response(&mut self, header: &PacketHeader, resp: &AuthResponse) -> bool {
        self.reset();
        self.write_u8(PacketType::AuthResponse as u8) && self.write_header(header) && self.write_pod(resp)
    }

    /// Serializes a chat message.
    pub fn serialize_chat(&mut self, header: &PacketHeader, chat: &Chat) -> bool {
        self.reset();
        self.write_u8(PacketType::Chat as u8)
            && self.write_header(header)
            && self.write_pod(&chat.player_id)
            && self.write_variable(&chat.text[..chat.text_len as usize])
    }

    /// Serializes a ping probe.
    pub fn serialize_ping(&mut self, header: &PacketHeader, ping: &Ping) -> bool {
        self.reset();
        self.write_u8(PacketType::Ping as u8) && self.write_header(header) && self.write_pod(ping)
    }

    /// Serializes a pong reply.
    pub fn serialize_pong(&mut self, header: &PacketHeader, pong: &Pong) -> bool {
        self.reset();
        self.write_u8(PacketType::Pong as u8) && self.write_header(header) && self.write_pod(pong)
    }
}

impl Default for PacketSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Packet deserializer - reads packets from a buffer.
pub struct PacketDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketDeserializer<'a> {
    /// Creates a new deserializer from a buffer.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        if self.position >= self.buffer.len() {
            return None;
        }
        let value = self.buffer[self.position];
        self.position += 1;
        Some(value)
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        if self.position + 2 > self.buffer.len() {
            return None;
        }
        let value = u16::from_le_bytes([self.buffer[self.position], self.buffer[self.position + 1]]);
        self.position += 2;
        Some(value)
    }

    /// Reads a Pod type directly.
    #[inline]
    pub fn read_pod<T: Pod + Copy>(&mut self) -> Option<T> {
        let size = std::mem::size_of::<T>();
        if self.position + size > self.buffer.len() {
            return None;
        }
        let slice = &self.buffer[self.position..self.position + size];
        self.position += size;
        bytemuck::try_pod_read_unaligned(slice).ok()
    }

    /// Reads a length-prefixed variable payload into a fixed inline buffer.
    /// Validates the declared length against `MAX_VARIABLE_PAYLOAD` and the
    /// remaining buffer before copying a single byte.
    pub fn read_variable(&mut self) -> Option<([u8; MAX_VARIABLE_PAYLOAD], u16)> {
        let len = self.read_u16()?;
        if len as usize > MAX_VARIABLE_PAYLOAD || self.position + len as usize > self.buffer.len() {
            return None;
        }
        let mut buf = [0u8; MAX_VARIABLE_PAYLOAD];
        buf[..len as usize].copy_from_slice(&self.buffer[self.position..self.position + len as usize]);
        self.position += len as usize;
        Some((buf, len))
    }

    /// Reads a packet header.
    #[inline]
    pub fn read_header(&mut self) -> Option<PacketHeader> {
        self.read_pod()
    }

    /// Deserializes a packet from the buffer.
    pub fn deserialize(&mut self) -> Option<Packet> {
        let packet_type_byte = self.read_u8()?;
        let header = self.read_header()?;

        match packet_type_byte {
            x if x == PacketType::AuthRequest as u8 => {
                let req = self.read_pod::<AuthRequest>()?;
                Some(Packet::AuthRequest(header, req))
            }
            x if x == PacketType::AuthResponse as u8 => {
                let resp = self.read_pod::<AuthResponse>()?;
                Some(Packet::AuthResponse(header, resp))
            }
            x if x == PacketType::ClientInput as u8 => {
                let input = self.read_pod::<ClientInput>()?;
                Some(Packet::ClientInput(header, input))
            }
            x if x == PacketType::WorldSnapshot as u8 => {
                let tick = self.read_pod::<u32>()?;
                let entity_count = self.read_pod::<u16>()?;
                let block_update_count = self.read_pod::<u16>()?;
                let mut snapshot = WorldSnapshot::empty(tick);
                for _ in 0..entity_count.min(WorldSnapshot::MAX_ENTITIES as u16) {
                    snapshot.add_entity(self.read_pod::<EntityState>()?);
                }
                for _ in 0..block_update_count.min(WorldSnapshot::MAX_BLOCK_UPDATES as u16) {
                    snapshot.add_block_update(self.read_pod::<BlockUpdate>()?);
                }
                Some(Packet::WorldSnapshot(header, snapshot))
            }
            x if x == PacketType::Chat as u8 => {
                let player_id = self.read_pod::<u32>()?;
                let (text, text_len) = self.read_variable()?;
                Some(Packet::Chat(header, Chat { player_id, text_len, text }))
            }
            x if x == PacketType::Ping as u8 => Some(Packet::Ping(header, self.read_pod::<Ping>()?)),
            x if x == PacketType::Pong as u8 => Some(Packet::Pong(header, self.read_pod::<Pong>()?)),
            x if x == PacketType::ChunkRequest as u8 => {
                Some(Packet::ChunkRequest(header, self.read_pod::<ChunkRequest>()?))
            }
            x if x == PacketType::BlockUpdate as u8 => {
                Some(Packet::BlockUpdate(header, self.read_pod::<BlockUpdate>()?))
            }
            x if x == PacketType::EntityMove as u8 => {
                Some(Packet::EntityMove(header, self.read_pod::<EntityState>()?))
            }
            x if x == PacketType::EntityActionResponse as u8 => {
                Some(Packet::EntityActionResponse(header, self.read_pod::<EntityActionResponse>()?))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize_client_input() {
        let header = PacketHeader::new(1, 0, 0);
        let mut input = ClientInput::new(5, 100);
        input.move_x = 127;
        input.move_y = -128;
        input.action = ActionKind::Attack as u8;

        let mut serializer = PacketSerializer::new();
        assert!(serializer.serialize_client_input(&header, &input));

        let mut deserializer = PacketDeserializer::new(serializer.as_slice());
        let packet = deserializer.deserialize().unwrap();

        match packet {
            Packet::ClientInput(h, i) => {
                assert_eq!(h.sequence, 1);
                assert_eq!(i.input_sequence, 5);
                assert_eq!(i.move_x, 127);
                assert_eq!(i.requested_action(), Some(ActionKind::Attack));
            }
            _ => panic!("expected ClientInput packet"),
        }
    }

    #[test]
    fn test_serialize_deserialize_world_snapshot() {
        let header = PacketHeader::new(2, 0, 0);
        let mut snapshot = WorldSnapshot::empty(42);
        for i in 0..5 {
            snapshot.add_entity(EntityState { entity_id: i, pos_x: i as i32 * 256, ..Default::default() });
        }
        snapshot.add_block_update(BlockUpdate { x: 7, y: 3, block_id: 42, ..Default::default() });

        let mut serializer = PacketSerializer::new();
        assert!(serializer.serialize_world_snapshot(&header, &snapshot));

        let mut deserializer = PacketDeserializer::new(serializer.as_slice());
        match deserializer.deserialize().unwrap() {
            Packet::WorldSnapshot(_, s) => {
                assert_eq!(s.tick, 42);
                assert_eq!(s.entity_count, 5);
                assert_eq!(s.block_update_count, 1);
                assert_eq!(s.entities[4].pos_x, 4 * 256);
            }
            _ => panic!("expected WorldSnapshot packet"),
        }
    }

    #[test]
    fn test_variable_payload_rejects_declared_length_past_buffer() {
        let mut buf = vec![0u8; 4];
        buf[0..2].copy_from_slice(&500u16.to_le_bytes());
        let mut deserializer = PacketDeserializer::new(&buf);
        assert!(deserializer.read_variable().is_none());
    }

    #[test]
    fn test_chat_roundtrip() {
        let header = PacketHeader::new(3, 0, 0);
        let chat = Chat::new(9, "hello region");
        let mut serializer = PacketSerializer::new();
        assert!(serializer.serialize_chat(&header, &chat));

        let mut deserializer = PacketDeserializer::new(serializer.as_slice());
        match deserializer.deserialize().unwrap() {
            Packet::Chat(_, c) => {
                assert_eq!(c.player_id, 9);
                assert_eq!(c.as_str(), "hello region");
            }
            _ => panic!("expected Chat packet"),
        }
    }
}
