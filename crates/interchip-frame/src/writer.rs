use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use interchip_transport::LinkStream;

use crate::codec::{encode_packet, FrameConfig, Packet};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete packet frames to any `Write` stream.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a complete frame (blocking).
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: packet.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_packet(packet, &mut self.buf)?;

        let frame = std::mem::take(&mut self.buf);
        let result = self.write_all_bytes(&frame);
        self.buf = frame;
        result?;
        self.flush()
    }

    /// Write pre-encoded frame bytes verbatim.
    ///
    /// Used by the reliability layer to retransmit a frame without re-encoding
    /// (the stored bytes already carry the original sequence number).
    pub fn write_raw(&mut self, frame: &[u8]) -> Result<()> {
        self.write_all_bytes(frame)?;
        self.flush()
    }

    fn write_all_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl PacketWriter<LinkStream> {
    /// Create a packet writer for a [`LinkStream`] and apply the write timeout
    /// from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(|err| match err {
                interchip_transport::TransportError::Io(io) => FrameError::Io(io),
                other => FrameError::Io(std::io::Error::other(other.to_string())),
            })?;
        Ok(Self::with_config(inner, config))
    }
}
