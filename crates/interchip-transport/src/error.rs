use std::path::PathBuf;

/// Errors that can occur while opening or driving a chip link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the link endpoint.
    #[error("failed to bind link endpoint at {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the remote endpoint.
    #[error("failed to connect to link endpoint at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming link connection.
    #[error("failed to accept link connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint path is too long for the platform.
    #[error("endpoint path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
