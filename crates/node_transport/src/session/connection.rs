//! # Session Connection Management
//!
//! Tracks connected game sessions, their channel state, and their
//! recent input history.
//!
//! ## Design
//!
//! - Fixed-size connection slots (no allocations)
//! - Ring buffer for input history
//! - Sequence number tracking for reliable delivery

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::prediction::InputSequencer;
use crate::protocol::{AckBitfield, ClientInput, SequenceNumber};

/// Unique identifier for a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Invalid/null connection ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns true if this is a null/invalid ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::NULL
    }
}

/// State of a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Slot is free.
    Disconnected = 0,
    /// Authentication handshake in progress.
    Connecting = 1,
    /// Fully authenticated and active.
    Connected = 2,
    /// Idle timeout elapsed, pending cleanup.
    TimedOut = 3,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Size of input history ring buffer.
const INPUT_HISTORY_SIZE: usize = 64;

/// Idle timeout: a session with no received packet for this long is reaped.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Client connection data.
///
/// Fixed-size structure for zero-allocation client management.
#[derive(Clone, Debug)]
pub struct ClientConnection {
    /// Connection ID.
    pub id: ConnectionId,
    /// Connection state.
    pub state: ConnectionState,
    /// Client's network address.
    pub addr: SocketAddr,
    /// Last received sequence number.
    pub last_recv_sequence: SequenceNumber,
    /// Next sequence number to send.
    pub next_send_sequence: SequenceNumber,
    /// Acknowledgment bitmask.
    pub ack_bits: AckBitfield,
    /// Last acknowledged sequence.
    pub last_ack: SequenceNumber,
    /// Round-trip time estimate (microseconds).
    pub rtt_us: u32,
    /// Wall-clock time of the last received packet.
    pub last_activity: Instant,
    /// Player entity ID in the world.
    pub entity_id: u32,
    /// Input history ring buffer.
    pub input_history: [ClientInput; INPUT_HISTORY_SIZE],
    /// Index of latest input in ring buffer.
    pub input_write_index: usize,
    /// Number of inputs in buffer.
    pub input_count: usize,
    /// Tracks which input sequences this session's simulator input has
    /// had applied, for stamping `EntityState::ack_input_sequence`.
    pub input_sequencer: InputSequencer,
}

impl ClientConnection {
    /// Creates a new disconnected client slot.
    #[must_use]
    pub fn new_empty() -> Self {
        Self {
            id: ConnectionId::NULL,
            state: ConnectionState::Disconnected,
            addr: "0.0.0.0:0".parse().expect("valid zero address"),
            last_recv_sequence: 0,
            next_send_sequence: 0,
            ack_bits: 0,
            last_ack: 0,
            rtt_us: 0,
            last_activity: Instant::now(),
            entity_id: u32::MAX,
            input_history: [ClientInput::new(0, 0); INPUT_HISTORY_SIZE],
            input_write_index: 0,
            input_count: 0,
            input_sequencer: InputSequencer::new(),
        }
    }

    /// Initializes this slot for a new connection.
    pub fn init(&mut self, id: ConnectionId, addr: SocketAddr, entity_id: u32) {
        self.id = id;
        self.state = ConnectionState::Connected;
        self.addr = addr;
        self.last_recv_sequence = 0;
        self.next_send_sequence = 0;
        self.ack_bits = 0;
        self.last_ack = 0;
        self.rtt_us = 100_000; // Start with 100ms estimate
        self.last_activity = Instant::now();
        self.entity_id = entity_id;
        self.input_write_index = 0;
        self.input_count = 0;
        self.input_sequencer.clear();
    }

    /// Resets this slot to disconnected state.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.id = ConnectionId::NULL;
    }

    /// Returns true if this slot is active.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ConnectionState::Connected | ConnectionState::Connecting)
    }

    /// Adds an input to the history.
    pub fn add_input(&mut self, input: ClientInput) {
        self.input_history[self.input_write_index] = input;
        self.input_write_index = (self.input_write_index + 1) % INPUT_HISTORY_SIZE;
        self.input_count = self.input_count.saturating_add(1).min(INPUT_HISTORY_SIZE);
        self.input_sequencer.record(&input);
    }

    /// Marks `sequence` as applied by the simulator, advancing the
    /// watermark this session's next outgoing `ack_input_sequence` uses.
    pub fn mark_input_applied(&mut self, sequence: u32) {
        self.input_sequencer.mark_applied(sequence);
    }

    /// The input sequence to stamp into this session's next outgoing
    /// `EntityState::ack_input_sequence`.
    #[must_use]
    pub const fn ack_sequence(&self) -> u32 {
        self.input_sequencer.ack_sequence()
    }

    /// Gets the latest input.
    #[must_use]
    pub fn latest_input(&self) -> Option<&ClientInput> {
        if self.input_count == 0 {
            return None;
        }
        let index = if self.input_write_index == 0 {
            INPUT_HISTORY_SIZE - 1
        } else {
            self.input_write_index - 1
        };
        Some(&self.input_history[index])
    }

    /// Gets an input by its client-assigned sequence number.
    #[must_use]
    pub fn get_input_by_sequence(&self, sequence: u32) -> Option<&ClientInput> {
        for i in 0..self.input_count {
            let index = (self.input_write_index + INPUT_HISTORY_SIZE - 1 - i) % INPUT_HISTORY_SIZE;
            if self.input_history[index].input_sequence == sequence {
                return Some(&self.input_history[index]);
            }
        }
        None
    }

    /// Updates acknowledgment state from a received packet header.
    pub fn update_ack(&mut self, ack: SequenceNumber, ack_bits: AckBitfield) {
        self.last_ack = ack;
        self.ack_bits = ack_bits;
    }

    /// Gets the next sequence number and increments it.
    #[inline]
    pub fn next_sequence(&mut self) -> SequenceNumber {
        let seq = self.next_send_sequence;
        self.next_send_sequence = self.next_send_sequence.wrapping_add(1);
        seq
    }

    /// Records packet reception: tracks newest sequence seen and resets the idle clock.
    pub fn record_recv(&mut self, sequence: SequenceNumber) {
        let diff = sequence.wrapping_sub(self.last_recv_sequence);
        if diff < 32768 {
            self.last_recv_sequence = sequence;
        }
        self.last_activity = Instant::now();
    }

    /// Returns true once `IDLE_TIMEOUT` has elapsed since the last received packet.
    #[must_use]
    pub fn is_idle_timed_out(&self) -> bool {
        self.last_activity.elapsed() >= IDLE_TIMEOUT
    }
}

impl Default for ClientConnection {
    fn default() -> Self {
        Self::new_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lifecycle() {
        let mut conn = ClientConnection::new_empty();
        assert!(!conn.is_active());

        let addr: SocketAddr = "192.168.1.1:12345".parse().unwrap();
        conn.init(ConnectionId(1), addr, 100);

        assert!(conn.is_active());
        assert_eq!(conn.id.0, 1);
        assert_eq!(conn.entity_id, 100);

        conn.disconnect();
        assert!(!conn.is_active());
    }

    #[test]
    fn test_input_history_lookup_by_sequence() {
        let mut conn = ClientConnection::new_empty();
        conn.init(ConnectionId(1), "127.0.0.1:1234".parse().unwrap(), 0);

        for i in 0..10 {
            conn.add_input(ClientInput { input_sequence: i, tick: i, ..ClientInput::new(i, i) });
        }

        let latest = conn.latest_input().unwrap();
        assert_eq!(latest.input_sequence, 9);

        let seq5 = conn.get_input_by_sequence(5).unwrap();
        assert_eq!(seq5.tick, 5);
    }

    #[test]
    fn test_input_history_overflow_drops_oldest() {
        let mut conn = ClientConnection::new_empty();
        conn.init(ConnectionId(1), "127.0.0.1:1234".parse().unwrap(), 0);

        for i in 0..100 {
            conn.add_input(ClientInput { input_sequence: i, tick: i, ..ClientInput::new(i, i) });
        }

        let latest = conn.latest_input().unwrap();
        assert_eq!(latest.input_sequence, 99);
        assert!(conn.get_input_by_sequence(0).is_none());
    }

    #[test]
    fn test_not_idle_timed_out_immediately_after_activity() {
        let mut conn = ClientConnection::new_empty();
        conn.init(ConnectionId(1), "127.0.0.1:1234".parse().unwrap(), 0);
        assert!(!conn.is_idle_timed_out());
    }
}
