//! ACK/NACK control payloads.
//!
//! Control frames are the only payloads the protocol core interprets itself:
//! two bytes, the sequence number being answered and an error code. They are
//! never acknowledged in turn.

use crate::error::{NodeError, Result};

/// The acknowledged frame was handled successfully.
pub const ERR_OK: u8 = 0x00;

/// The receiver has no handler for the frame's message type.
pub const ERR_UNKNOWN_TYPE: u8 = 0x01;

/// Reserved: the receiver's dispatch queue was full.
///
/// Today a queue-full frame is dropped without a NACK (the sender's retry
/// recovers it); this code is reserved so a future receiver can signal
/// busy instead.
pub const ERR_QUEUE_FULL: u8 = 0x02;

/// The two-byte payload of an ACK or NACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckNack {
    /// Sequence number of the data frame being answered.
    pub seq: u8,
    /// One of the `ERR_*` codes.
    pub error_code: u8,
}

impl AckNack {
    /// Wire size of a control payload.
    pub const WIRE_SIZE: usize = 2;

    /// Encode to wire bytes.
    pub fn to_bytes(self) -> [u8; Self::WIRE_SIZE] {
        [self.seq, self.error_code]
    }

    /// Decode from a control frame payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() != Self::WIRE_SIZE {
            return Err(NodeError::MalformedControl {
                len: payload.len(),
            });
        }
        Ok(Self {
            seq: payload[0],
            error_code: payload[1],
        })
    }
}

/// Human-readable error-code name for logs and CLI output.
pub fn error_name(code: u8) -> &'static str {
    match code {
        ERR_OK => "OK",
        ERR_UNKNOWN_TYPE => "UNKNOWN_TYPE",
        ERR_QUEUE_FULL => "QUEUE_FULL",
        _ => "UNKNOWN",
    }
}
