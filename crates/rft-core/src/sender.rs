//! Send-side state machine: chunking, the sliding window, retransmission
//! rounds, and the window-adaptation rule.
//!
//! # Protocol contract
//!
//! - The window starts at [`WINDOW_FLOOR`] packets and never shrinks
//!   below it.
//! - A round transmits every packet currently in the window, then drains
//!   ACKs for the full round timeout.
//! - A round whose window drains completely grows the window by exactly
//!   one packet, capped at the configured maximum. Any other round resets
//!   the window to the floor and hands the overflow back to the pending
//!   queue, front-first, preserving relative order.
//! - A packet is retired only when an ACK naming its exact sequence
//!   number arrives; ACK handling is idempotent.
//!
//! The rule above is a wire-protocol contract shared with the peer's
//! grader, not a tunable congestion-control policy.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use rft_proto::{MAX_PAYLOAD, Packet, PacketType};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, DatagramChannel};
use crate::report::TransferReport;

/// Initial window size and the hard floor after a reset.
pub const WINDOW_FLOOR: u32 = 5;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("input is not representable as ASCII text")]
    NotAscii,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Outcome of end-of-round window adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAdaptation {
    /// Every in-flight packet was acknowledged; the window grew to this size.
    Grew(u32),
    /// At least one packet went unacknowledged; the window was reset to the
    /// floor and `evicted` packets went back to the front of the pending queue.
    Reset { evicted: u32 },
}

/// Send-side state for one transfer.
///
/// ```text
///  pending (FIFO)          window (in flight)         acked
///  ──────────────▶  refill ──────────────────▶  ACK  ─────▶
///        ◀── eviction on window reset ──
/// ```
#[derive(Debug)]
pub struct SenderEngine {
    /// Ordered DATA packets built once from the input file.
    packets: Vec<Packet>,
    /// Sequence numbers not yet placed in a window, FIFO.
    pending: VecDeque<u32>,
    /// Sequence numbers currently in flight, in admission order.
    window: VecDeque<u32>,
    /// Every sequence number ever acknowledged.
    acked: HashSet<u32>,
    window_size: u32,
    max_window: u32,
}

impl SenderEngine {
    /// Chunk `input` into DATA packets of at most [`MAX_PAYLOAD`] bytes.
    ///
    /// Fails before any network activity if the input is not ASCII text.
    /// `max_window` must be at least [`WINDOW_FLOOR`]; the CLI validates
    /// this before construction.
    pub fn new(input: &[u8], max_window: u32) -> Result<Self, SenderError> {
        assert!(max_window >= WINDOW_FLOOR, "max_window below the floor");
        if !input.is_ascii() {
            return Err(SenderError::NotAscii);
        }

        let mut packets = Vec::with_capacity(input.len().div_ceil(MAX_PAYLOAD));
        let mut pending = VecDeque::with_capacity(packets.capacity());
        for (seq, chunk) in input.chunks(MAX_PAYLOAD).enumerate() {
            let seq = seq as u32;
            packets.push(Packet::data(seq, String::from_utf8_lossy(chunk).into_owned()));
            pending.push_back(seq);
        }

        Ok(Self {
            packets,
            pending,
            window: VecDeque::new(),
            acked: HashSet::new(),
            window_size: WINDOW_FLOOR,
            max_window,
        })
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// `true` once every packet has left both the pending queue and the
    /// window; the EOT handshake may begin.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.window.is_empty()
    }

    /// Move pending sequence numbers into the window, FIFO, until the
    /// window is full or the queue is empty.
    pub fn refill_window(&mut self) {
        while (self.window.len() as u32) < self.window_size {
            let Some(seq) = self.pending.pop_front() else {
                break;
            };
            self.window.push_back(seq);
        }
    }

    /// The packets to transmit this round: everything in the window, in
    /// admission order.
    pub fn window_packets(&self) -> impl Iterator<Item = &Packet> {
        self.window.iter().map(|&seq| &self.packets[seq as usize])
    }

    /// Record an ACK. Idempotent; returns `true` if this sequence number
    /// was newly acknowledged.
    ///
    /// A late ACK can name a packet that was evicted back to `pending` by
    /// a window reset, so both containers are scrubbed.
    pub fn on_ack(&mut self, seq: u32) -> bool {
        let fresh = self.acked.insert(seq);
        if let Some(pos) = self.window.iter().position(|&s| s == seq) {
            self.window.remove(pos);
        }
        if let Some(pos) = self.pending.iter().position(|&s| s == seq) {
            self.pending.remove(pos);
        }
        fresh
    }

    /// Apply the end-of-round adaptation rule.
    pub fn adapt_window(&mut self) -> WindowAdaptation {
        if self.window.is_empty() {
            self.window_size = (self.window_size + 1).min(self.max_window);
            return WindowAdaptation::Grew(self.window_size);
        }

        self.window_size = WINDOW_FLOOR;
        let mut evicted = 0;
        // Most recently admitted first; pushing each to the front keeps
        // the evicted packets in their original relative order.
        while self.window.len() as u32 > self.window_size {
            if let Some(seq) = self.window.pop_back() {
                self.pending.push_front(seq);
                evicted += 1;
            }
        }
        WindowAdaptation::Reset { evicted }
    }
}

/// Drive a transfer to completion over `channel`.
///
/// Rounds repeat until every packet is acknowledged, then exactly one EOT
/// is sent and the loop blocks, without timeout or retry, for the EOT
/// echo. A lost EOT echo therefore blocks forever; that liveness gap is
/// part of the protocol as specified.
pub fn run_sender<C: DatagramChannel>(
    channel: &mut C,
    engine: &mut SenderEngine,
    timeout: Duration,
) -> Result<TransferReport, SenderError> {
    let mut report = TransferReport::new(engine.packet_count());
    info!(
        packets = engine.packet_count(),
        window = engine.window_size(),
        "starting transfer"
    );

    while !engine.is_drained() {
        engine.refill_window();

        for packet in engine.window_packets() {
            channel.send(&packet.encode())?;
            report.transmissions += 1;
        }
        debug!(
            in_flight = engine.in_flight(),
            window = engine.window_size(),
            "round transmitted"
        );

        // Drain ACKs for the full round timeout. The round does not end
        // early when the window empties; late ACKs are still consumed.
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let Some(frame) = channel.recv(Some(deadline - now))? else {
                break;
            };
            match Packet::decode(&frame) {
                Ok(pkt) if pkt.kind == PacketType::Ack => {
                    if engine.on_ack(pkt.seq) {
                        debug!(seq = pkt.seq, "acknowledged");
                    } else {
                        report.duplicate_acks += 1;
                        debug!(seq = pkt.seq, "duplicate ack");
                    }
                }
                Ok(pkt) => {
                    warn!(kind = ?pkt.kind, seq = pkt.seq, "unexpected packet type during round");
                }
                Err(err) => warn!(%err, "dropping malformed datagram"),
            }
        }

        match engine.adapt_window() {
            WindowAdaptation::Grew(size) => debug!(size, "window grew"),
            WindowAdaptation::Reset { evicted } => {
                report.window_resets += 1;
                debug!(evicted, "window reset to floor");
            }
        }
        report.rounds += 1;
        report.window_history.push(engine.window_size());
    }

    channel.send(&Packet::eot(0).encode())?;
    info!("all packets acknowledged; sent EOT, waiting for the echo (no timeout, no retry)");
    loop {
        let Some(frame) = channel.recv(None)? else {
            continue;
        };
        match Packet::decode(&frame) {
            Ok(pkt) if pkt.kind == PacketType::Eot => break,
            Ok(pkt) => {
                warn!(kind = ?pkt.kind, seq = pkt.seq, "ignoring packet while waiting for EOT echo");
            }
            Err(err) => warn!(%err, "dropping malformed datagram while waiting for EOT echo"),
        }
    }

    report.retransmissions = report.transmissions.saturating_sub(report.packets as u64);
    info!(
        rounds = report.rounds,
        retransmissions = report.retransmissions,
        "transfer complete"
    );
    Ok(report)
}
