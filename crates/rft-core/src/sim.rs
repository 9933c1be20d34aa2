//! In-memory stand-in for the lossy relay, used by integration tests.
//!
//! [`link_pair`] returns two connected [`SimEndpoint`]s. Each direction
//! applies seeded fault injection on send: loss, duplication, and
//! one-slot reordering (a held frame is released right after the next
//! one). EOT-type frames always go through untouched — the terminal
//! handshake has no retransmission, so dropping one would hang a test
//! forever rather than exercise anything.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rft_proto::{Packet, PacketType};
use tracing::debug;

use crate::channel::{ChannelError, DatagramChannel};

/// Fault model applied independently to each direction.
#[derive(Debug, Clone, Copy)]
pub struct FaultConfig {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

pub struct SimEndpoint {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    rng: StdRng,
    faults: FaultConfig,
    /// Frame held back for reordering, released after the next send.
    held: Option<Vec<u8>>,
}

/// Connect two endpoints through fault-injecting queues.
pub fn link_pair(faults: FaultConfig) -> (SimEndpoint, SimEndpoint) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    let endpoint = |tx, rx, seed| SimEndpoint {
        tx,
        rx,
        rng: StdRng::seed_from_u64(seed),
        faults,
        held: None,
    };
    (
        endpoint(a_tx, a_rx, faults.seed),
        endpoint(b_tx, b_rx, faults.seed.wrapping_add(1)),
    )
}

impl SimEndpoint {
    fn forward(&self, frame: Vec<u8>) -> Result<(), ChannelError> {
        self.tx.send(frame).map_err(|_| ChannelError::Closed)
    }
}

fn is_eot(frame: &[u8]) -> bool {
    matches!(Packet::decode(frame), Ok(pkt) if pkt.kind == PacketType::Eot)
}

impl DatagramChannel for SimEndpoint {
    fn send(&mut self, frame: &[u8]) -> Result<(), ChannelError> {
        if is_eot(frame) {
            if let Some(held) = self.held.take() {
                self.forward(held)?;
            }
            return self.forward(frame.to_vec());
        }

        if self.rng.random::<f64>() < self.faults.loss_rate {
            debug!("sim link dropped a frame");
            return Ok(());
        }
        if self.held.is_none() && self.rng.random::<f64>() < self.faults.reorder_rate {
            self.held = Some(frame.to_vec());
            return Ok(());
        }

        self.forward(frame.to_vec())?;
        if self.rng.random::<f64>() < self.faults.duplicate_rate {
            debug!("sim link duplicated a frame");
            self.forward(frame.to_vec())?;
        }
        if let Some(held) = self.held.take() {
            self.forward(held)?;
        }
        Ok(())
    }

    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, ChannelError> {
        match timeout {
            Some(limit) => match self.rx.recv_timeout(limit) {
                Ok(frame) => Ok(Some(frame)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
            },
            None => self.rx.recv().map(Some).map_err(|_| ChannelError::Closed),
        }
    }
}
