//! Transfer statistics collected by the sender run loop, exportable as
//! JSON by the CLI.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    /// DATA packets the input was chunked into.
    pub packets: usize,
    /// Completed send/drain/adapt rounds.
    pub rounds: u64,
    /// DATA frames put on the wire, first transmissions included.
    pub transmissions: u64,
    /// Frames beyond each packet's first transmission.
    pub retransmissions: u64,
    /// ACKs naming an already-acknowledged sequence number.
    pub duplicate_acks: u64,
    /// Rounds that ended with the window reset to the floor.
    pub window_resets: u64,
    /// Window size after each round's adaptation.
    pub window_history: Vec<u32>,
}

impl TransferReport {
    pub(crate) fn new(packets: usize) -> Self {
        Self {
            packets,
            rounds: 0,
            transmissions: 0,
            retransmissions: 0,
            duplicate_acks: 0,
            window_resets: 0,
            window_history: Vec::new(),
        }
    }
}
