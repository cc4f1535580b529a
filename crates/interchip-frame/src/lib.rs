//! Checksummed packet framing for the interchip protocol.
//!
//! Every packet crossing the wire is framed as:
//! - A 2-byte magic number ("IC") for stream resynchronization
//! - Source device id, message type, and sequence number (1 byte each)
//! - A 1-byte payload length
//! - The payload (up to [`MAX_PAYLOAD`] bytes)
//! - A CRC-16/CCITT-FALSE checksum over everything after the magic
//!
//! The decoder is incremental: feed it bytes as they arrive and it hands back
//! complete packets, discarding corrupt frames and rescanning for the magic so
//! one bad frame never blocks the stream.

pub mod codec;
pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use codec::{
    decode_packet, encode_packet, FrameConfig, Packet, CRC_SIZE, HEADER_SIZE, MAGIC, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
pub use types::{
    device_name, is_control, msg_type_name, DEVICE_DISPLAY, DEVICE_RADIO, DEVICE_TOUCH,
    KNOWN_DEVICES, MSG_ACK, MSG_NACK, MSG_NOTIFICATION, MSG_RADIO_DATA, MSG_STATUS_UPDATE,
    MSG_TOUCH_EVENT,
};
pub use writer::PacketWriter;
