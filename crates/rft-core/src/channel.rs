//! The seam between the protocol engines and the network.
//!
//! Both peers address a fixed relay endpoint and never assume a direct
//! path to each other, so the whole transport surface is two operations:
//! fire a frame at the relay, and wait for the next frame from it.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Fatal transport failures. A timeout is never one of these; the run
/// loops treat it as expected control flow (`Ok(None)` from [`recv`]).
///
/// [`recv`]: DatagramChannel::recv
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel I/O failure")]
    Io(#[from] io::Error),
    #[error("channel closed by peer")]
    Closed,
}

/// A connectionless datagram channel to the relay.
pub trait DatagramChannel {
    /// Send one frame to the relay.
    fn send(&mut self, frame: &[u8]) -> Result<(), ChannelError>;

    /// Wait up to `timeout` for the next frame; `None` blocks forever.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, ChannelError>;
}
