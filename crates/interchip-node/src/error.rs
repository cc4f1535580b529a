/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error (link open, clone, timeout setup).
    #[error("transport error: {0}")]
    Transport(#[from] interchip_transport::TransportError),

    /// Frame-level error (encode, write, payload size).
    #[error("frame error: {0}")]
    Frame(#[from] interchip_frame::FrameError),

    /// The next sequence number for this destination is still awaiting
    /// acknowledgment; the send was refused rather than reusing it.
    #[error("sequence space exhausted for device 0x{dest:02X} (seq {seq} unresolved)")]
    SequenceExhausted { dest: u8, seq: u8 },

    /// A handler is already registered for this message type.
    #[error("handler already registered for message type 0x{0:02X}")]
    HandlerExists(u8),

    /// Control frames are emitted by the dispatch router; sending one by hand
    /// would break the one-response-per-frame guarantee.
    #[error("control message type 0x{0:02X} cannot be sent directly")]
    ControlSend(u8),

    /// The destination is not a known remote device.
    #[error("device 0x{0:02X} is not a sendable destination")]
    InvalidDestination(u8),

    /// A control frame carried a payload of the wrong size.
    #[error("malformed control payload ({len} bytes, expected 2)")]
    MalformedControl { len: usize },
}

pub type Result<T> = std::result::Result<T, NodeError>;
