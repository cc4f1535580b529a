/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame checksum did not match; the frame's bytes were discarded.
    #[error("corrupt frame (checksum expected 0x{expected:04X}, found 0x{found:04X})")]
    Corrupt { expected: u16, found: u16 },

    /// Leading garbage or an implausible header was dropped while rescanning
    /// for the frame magic.
    #[error("stream desynchronized ({dropped} bytes dropped)")]
    Desync { dropped: usize },

    /// The payload exceeds the maximum frame payload size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("link closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
