use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use interchip_transport::LinkStream;

use crate::codec::{decode_packet, FrameConfig, Packet};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete packets from any `Read` byte stream.
///
/// Handles partial reads internally — callers always get complete, checksummed
/// packets. `Corrupt`/`Desync` errors are recoverable: the bad bytes have
/// already been discarded, so calling [`PacketReader::read_packet`] again
/// resumes at the next frame boundary.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete packet (blocking, bounded by the link's read
    /// timeout if one is set).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = decode_packet(&mut self.buf, self.config.max_payload_size)? {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl PacketReader<LinkStream> {
    /// Create a packet reader for a [`LinkStream`] and apply the read timeout
    /// from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: interchip_transport::TransportError) -> FrameError {
    match err {
        interchip_transport::TransportError::Io(io)
        | interchip_transport::TransportError::Accept(io) => FrameError::Io(io),
        interchip_transport::TransportError::Bind { source, .. }
        | interchip_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
