//! Sender and receiver state machines for the RFT selective-repeat
//! file-transfer protocol, plus the channel seam they run over.
//!
//! Engines are pure with respect to I/O: the [`sender`] and [`receiver`]
//! modules expose both the state machines themselves and blocking run
//! loops that drive them over any [`DatagramChannel`]. The [`sim`] module
//! provides an in-memory fault-injecting link for tests.

pub mod channel;
pub mod log;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod sim;

pub use channel::{ChannelError, DatagramChannel};
pub use log::{ArrivalEvent, ArrivalLog};
pub use receiver::{ReceiverEngine, ReceiverError, ReceiverSummary, run_receiver};
pub use report::TransferReport;
pub use sender::{SenderEngine, SenderError, WINDOW_FLOOR, run_sender};
