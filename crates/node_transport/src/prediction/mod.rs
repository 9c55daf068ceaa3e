//! # Input Sequencing & Reconciliation Stamping
//!
//! The server never predicts on a client's behalf; client-side prediction
//! and replay are the collaborating client's responsibility. What the
//! server owns is the other half of that contract: remembering which
//! input sequence it has actually applied for each session, so every
//! outgoing `EntityState` can carry an `ack_input_sequence` the client
//! can reconcile against.
//!
//! ```text
//! Client:   Input[1] Input[2] Input[3] Input[4] Input[5]
//!                │
//! Server:        ▼ applies in order, tracks highest applied
//!           EntityState{ ack_input_sequence: 3 } ---> client
//!                                                      replays 4, 5 locally
//! ```

use crate::protocol::ClientInput;

/// Size of the per-connection input window.
const INPUT_WINDOW_SIZE: usize = 64;

/// One input slot tracked for acknowledgment bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
struct TrackedInput {
    sequence: u32,
    applied: bool,
}

/// Tracks, for a single session, which input sequences have been
/// received and applied by the simulator, so the next outgoing snapshot
/// knows what to stamp into `ack_input_sequence`.
#[derive(Clone, Debug)]
pub struct InputSequencer {
    window: [TrackedInput; INPUT_WINDOW_SIZE],
    write_index: usize,
    count: usize,
    highest_applied: u32,
}

impl InputSequencer {
    /// Creates an empty sequencer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: [TrackedInput { sequence: 0, applied: false }; INPUT_WINDOW_SIZE],
            write_index: 0,
            count: 0,
            highest_applied: 0,
        }
    }

    /// Records that `input` was received this tick, before it is applied.
    pub fn record(&mut self, input: &ClientInput) {
        self.window[self.write_index] = TrackedInput { sequence: input.input_sequence, applied: false };
        self.write_index = (self.write_index + 1) % INPUT_WINDOW_SIZE;
        self.count = (self.count + 1).min(INPUT_WINDOW_SIZE);
    }

    /// Marks `sequence` as fully applied by the simulator, advancing the
    /// acknowledgment watermark if this closes a gap at the front.
    pub fn mark_applied(&mut self, sequence: u32) {
        for slot in &mut self.window {
            if slot.sequence == sequence {
                slot.applied = true;
            }
        }
        if sequence >= self.highest_applied || self.highest_applied == 0 {
            self.highest_applied = self.highest_applied.max(sequence);
        }
    }

    /// Returns the input sequence that should be stamped into this
    /// session's next outgoing `EntityState.ack_input_sequence`.
    #[must_use]
    pub const fn ack_sequence(&self) -> u32 {
        self.highest_applied
    }

    /// Returns inputs received but not yet marked applied, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.count)
            .map(move |i| (self.write_index + INPUT_WINDOW_SIZE - self.count + i) % INPUT_WINDOW_SIZE)
            .filter_map(move |idx| {
                let slot = self.window[idx];
                (!slot.applied).then_some(slot.sequence)
            })
    }

    /// Clears all tracked state (e.g. on respawn or reconnect).
    pub fn clear(&mut self) {
        self.count = 0;
        self.write_index = 0;
        self.highest_applied = 0;
    }
}

impl Default for InputSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(seq: u32) -> ClientInput {
        ClientInput::new(seq, seq)
    }

    #[test]
    fn test_ack_sequence_tracks_highest_applied() {
        let mut seq = InputSequencer::new();
        for i in 1..=5 {
            seq.record(&input(i));
        }
        seq.mark_applied(3);
        assert_eq!(seq.ack_sequence(), 3);
        seq.mark_applied(5);
        assert_eq!(seq.ack_sequence(), 5);
    }

    #[test]
    fn test_pending_excludes_applied() {
        let mut seq = InputSequencer::new();
        for i in 1..=4 {
            seq.record(&input(i));
        }
        seq.mark_applied(2);
        let pending: Vec<u32> = seq.pending().collect();
        assert_eq!(pending, vec![1, 3, 4]);
    }

    #[test]
    fn test_clear_resets_watermark() {
        let mut seq = InputSequencer::new();
        seq.record(&input(10));
        seq.mark_applied(10);
        assert_eq!(seq.ack_sequence(), 10);
        seq.clear();
        assert_eq!(seq.ack_sequence(), 0);
    }
}
