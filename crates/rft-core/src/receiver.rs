//! Receive-side state machine: admission, deduplication, reordering, and
//! strictly in-order delivery.
//!
//! [`ReceiverEngine::on_packet`] classifies one datagram and returns the
//! side effects as a buffered [`Step`]; [`run_receiver`] performs them.
//! Keeping the engine free of I/O makes every row of the admission table
//! testable without a socket or a filesystem.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use rft_proto::{Packet, PacketType};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, DatagramChannel};
use crate::log::{ArrivalEvent, ArrivalLog};

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("output or arrival-log write failed")]
    Io(#[from] std::io::Error),
}

/// Side effects of admitting one datagram, to be performed by the caller
/// in order: reply, deliveries, log event.
#[derive(Debug, Default)]
pub struct Step {
    /// Packet to send back to the relay, if any.
    pub reply: Option<Packet>,
    /// Payloads that became deliverable, in strict sequence order.
    pub deliver: Vec<String>,
    /// Line to append to the arrival log, if any.
    pub event: Option<ArrivalEvent>,
    /// Set when an EOT was handled; no further datagrams are admitted.
    pub done: bool,
}

/// Receive-side state for one transfer.
pub struct ReceiverEngine {
    /// Next in-order sequence number, monotonically increasing from 0.
    recv_base: u32,
    /// Every sequence number ever acknowledged.
    acked: HashSet<u32>,
    /// Received, in-window, not-yet-deliverable payloads keyed by seqnum.
    buffer: BTreeMap<u32, String>,
    buffer_size: u32,
}

impl ReceiverEngine {
    pub fn new(buffer_size: u32) -> Self {
        Self {
            recv_base: 0,
            acked: HashSet::new(),
            buffer: BTreeMap::new(),
            buffer_size,
        }
    }

    pub fn recv_base(&self) -> u32 {
        self.recv_base
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Classify and admit one datagram.
    pub fn on_packet(&mut self, pkt: Packet) -> Step {
        let mut step = Step::default();
        match pkt.kind {
            PacketType::Eot => {
                step.reply = Some(Packet::eot(pkt.seq));
                step.event = Some(ArrivalEvent::Eot);
                step.done = true;
            }
            PacketType::Data => self.on_data(pkt, &mut step),
            PacketType::Ack => {
                warn!(seq = pkt.seq, "ignoring ACK addressed to the receiver");
            }
        }
        step
    }

    fn on_data(&mut self, pkt: Packet, step: &mut Step) {
        let seq = pkt.seq;

        // Beyond buffer capacity: refuse admission, send no ACK. This is
        // the receiver's entire flow-control mechanism.
        if seq as u64 >= self.recv_base as u64 + self.buffer_size as u64 {
            debug!(seq, recv_base = self.recv_base, "dropping out-of-window packet");
            step.event = Some(ArrivalEvent::Dropped(seq));
            return;
        }

        // Retransmitted arrival: the original ACK may have been lost, so
        // re-ACK, but never re-buffer or re-deliver.
        if self.acked.contains(&seq) {
            debug!(seq, "re-acking duplicate");
            step.reply = Some(Packet::ack(seq));
            step.event = Some(ArrivalEvent::Dropped(seq));
            return;
        }

        if seq >= self.recv_base {
            self.acked.insert(seq);
            step.reply = Some(Packet::ack(seq));
            step.event = Some(ArrivalEvent::Buffered(seq));
            self.buffer.insert(seq, pkt.payload);

            // Drain the contiguous run starting at recv_base.
            while let Some(payload) = self.buffer.remove(&self.recv_base) {
                step.deliver.push(payload);
                self.recv_base += 1;
            }
            return;
        }

        // Stale sequence number below recv_base that was never acked.
        // Unreachable while the acknowledged set is intact; kept because
        // its observable behavior (no ACK, no log line) is part of the
        // admission table.
        warn!(seq, recv_base = self.recv_base, "unexpected stale packet");
    }
}

/// What the receiver run loop accomplished.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ReceiverSummary {
    pub delivered_packets: u64,
    pub delivered_bytes: u64,
}

/// Receive datagrams until an EOT arrives, appending in-order payloads to
/// `output` and admission events to `log`.
///
/// The per-iteration receive blocks without bound; absent datagrams, the
/// receiver idles forever. Both sinks are flushed on completion.
pub fn run_receiver<C, W, L>(
    channel: &mut C,
    engine: &mut ReceiverEngine,
    output: &mut W,
    log: &mut ArrivalLog<L>,
) -> Result<ReceiverSummary, ReceiverError>
where
    C: DatagramChannel,
    W: Write,
    L: Write,
{
    let mut summary = ReceiverSummary::default();
    loop {
        let Some(frame) = channel.recv(None)? else {
            continue;
        };
        let pkt = match Packet::decode(&frame) {
            Ok(pkt) => pkt,
            Err(err) => {
                warn!(%err, "dropping malformed datagram");
                continue;
            }
        };

        let step = engine.on_packet(pkt);
        if let Some(reply) = &step.reply {
            channel.send(&reply.encode())?;
        }
        for payload in &step.deliver {
            output.write_all(payload.as_bytes())?;
            summary.delivered_packets += 1;
            summary.delivered_bytes += payload.len() as u64;
        }
        if let Some(event) = step.event {
            log.record(event)?;
        }
        if step.done {
            break;
        }
    }

    output.flush()?;
    log.flush()?;
    info!(
        packets = summary.delivered_packets,
        bytes = summary.delivered_bytes,
        "receive complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(seq: u32, text: &str) -> Packet {
        Packet::data(seq, text.to_string())
    }

    #[test]
    fn in_order_packet_is_acked_and_delivered() {
        let mut engine = ReceiverEngine::new(10);
        let step = engine.on_packet(data(0, "first"));
        assert_eq!(step.reply, Some(Packet::ack(0)));
        assert_eq!(step.deliver, vec!["first".to_string()]);
        assert_eq!(step.event, Some(ArrivalEvent::Buffered(0)));
        assert!(!step.done);
        assert_eq!(engine.recv_base(), 1);
    }

    #[test]
    fn out_of_order_packets_are_buffered_then_drained() {
        let mut engine = ReceiverEngine::new(10);

        let step = engine.on_packet(data(2, "c"));
        assert_eq!(step.reply, Some(Packet::ack(2)));
        assert!(step.deliver.is_empty());
        assert_eq!(engine.buffered(), 1);

        let step = engine.on_packet(data(0, "a"));
        assert_eq!(step.deliver, vec!["a".to_string()]);
        assert_eq!(engine.recv_base(), 1);

        // Filling the gap releases the whole contiguous run.
        let step = engine.on_packet(data(1, "b"));
        assert_eq!(step.deliver, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(engine.recv_base(), 3);
        assert_eq!(engine.buffered(), 0);
    }

    #[test]
    fn duplicate_is_reacked_but_not_redelivered() {
        let mut engine = ReceiverEngine::new(10);
        engine.on_packet(data(0, "once"));

        let step = engine.on_packet(data(0, "once"));
        assert_eq!(step.reply, Some(Packet::ack(0)));
        assert!(step.deliver.is_empty());
        assert_eq!(step.event, Some(ArrivalEvent::Dropped(0)));
        assert_eq!(engine.recv_base(), 1);
    }

    #[test]
    fn redelivery_is_idempotent_at_any_repetition() {
        let mut engine = ReceiverEngine::new(10);
        let mut delivered = 0;
        for _ in 0..5 {
            delivered += engine.on_packet(data(0, "x")).deliver.len();
        }
        assert_eq!(delivered, 1);
    }

    #[test]
    fn out_of_window_packet_gets_no_ack() {
        let mut engine = ReceiverEngine::new(2);
        let step = engine.on_packet(data(5, "far ahead"));
        assert!(step.reply.is_none());
        assert!(step.deliver.is_empty());
        assert_eq!(step.event, Some(ArrivalEvent::Dropped(5)));
    }

    #[test]
    fn window_edge_is_exclusive() {
        let mut engine = ReceiverEngine::new(3);
        // recv_base = 0, buffer_size = 3: seq 2 admitted, seq 3 refused.
        assert!(engine.on_packet(data(2, "in")).reply.is_some());
        assert!(engine.on_packet(data(3, "out")).reply.is_none());
    }

    #[test]
    fn eot_is_echoed_and_terminates_admission() {
        let mut engine = ReceiverEngine::new(10);
        let step = engine.on_packet(Packet::eot(4));
        assert_eq!(step.reply, Some(Packet::eot(4)));
        assert_eq!(step.event, Some(ArrivalEvent::Eot));
        assert!(step.done);
    }

    #[test]
    fn ack_packets_are_ignored() {
        let mut engine = ReceiverEngine::new(10);
        let step = engine.on_packet(Packet::ack(3));
        assert!(step.reply.is_none());
        assert!(step.event.is_none());
        assert!(!step.done);
    }

    #[test]
    fn stale_unacked_packet_gets_no_ack_and_no_log_line() {
        let mut engine = ReceiverEngine::new(10);
        engine.on_packet(data(0, "a"));
        // Force the otherwise-unreachable branch by discarding the record
        // of the acknowledgment.
        engine.acked.remove(&0);

        let step = engine.on_packet(data(0, "a"));
        assert!(step.reply.is_none());
        assert!(step.event.is_none());
        assert!(step.deliver.is_empty());
    }
}
