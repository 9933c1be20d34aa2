pub mod packet;

pub use packet::{HEADER_LEN, MAX_DATAGRAM, MAX_PAYLOAD, Packet, PacketError, PacketType};
