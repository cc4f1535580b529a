use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + source (1) + msg_type (1) + seq (1) + len (1).
pub const HEADER_SIZE: usize = 6;

/// Checksum trailer size.
pub const CRC_SIZE: usize = 2;

/// Magic bytes: "IC" (0x49 0x43).
pub const MAGIC: [u8; 2] = [0x49, 0x43];

/// Maximum payload size per frame.
///
/// Bounded well below the u8 length-field limit to leave headroom for
/// transports with small MTUs; length bytes above this are treated as header
/// corruption.
pub const MAX_PAYLOAD: usize = 240;

/// The protocol's unit of exchange.
///
/// A packet is self-describing and transport-agnostic: the codec never looks
/// inside `payload` — interpretation belongs to the message type's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Device id of the originating chip.
    pub source: u8,
    /// Semantic kind of the payload (see [`crate::types`]).
    pub msg_type: u8,
    /// Per-sender sequence number, wraps modulo 256.
    pub seq: u8,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(source: u8, msg_type: u8, seq: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            source,
            msg_type,
            seq,
            payload: payload.into(),
        }
    }

    /// The total wire size of this packet (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────┬──────┬─────┬─────┬──────────────┬───────────┐
/// │ Magic (2B) │ Source │ Type │ Seq │ Len │ Payload      │ CRC16     │
/// │ 0x49 0x43  │ (1B)   │ (1B) │(1B) │(1B) │ (Len bytes)  │ (2B LE)   │
/// └────────────┴────────┴──────┴─────┴─────┴──────────────┴───────────┘
/// ```
/// The checksum covers every byte after the magic.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    if packet.payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: packet.payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let start = dst.len();
    dst.reserve(packet.wire_size());
    dst.put_slice(&MAGIC);
    dst.put_u8(packet.source);
    dst.put_u8(packet.msg_type);
    dst.put_u8(packet.seq);
    dst.put_u8(packet.payload.len() as u8);
    dst.put_slice(&packet.payload);

    let crc = crc16(&dst[start + MAGIC.len()..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Decode one packet from a receive buffer.
///
/// Returns `Ok(None)` while fewer bytes than a complete frame have arrived.
/// On a checksum mismatch the frame's bytes are discarded, the buffer is
/// resynchronized to the next magic candidate, and `FrameError::Corrupt` is
/// returned; the caller may simply decode again. Leading garbage is dropped
/// the same way with `FrameError::Desync`.
pub fn decode_packet(src: &mut BytesMut, max_payload: usize) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        let dropped = resync(src, 1);
        debug!(dropped, "no frame magic, rescanning");
        return Err(FrameError::Desync { dropped });
    }

    let payload_len = src[5] as usize;
    if payload_len > max_payload {
        // Length byte can't be trusted, so treat the whole header as noise.
        let dropped = resync(src, MAGIC.len());
        debug!(
            payload_len,
            max_payload, dropped, "implausible length byte, rescanning"
        );
        return Err(FrameError::Desync { dropped });
    }

    let total = HEADER_SIZE + payload_len + CRC_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    let expected = crc16(&src[MAGIC.len()..HEADER_SIZE + payload_len]);
    let found = u16::from_le_bytes([src[total - 2], src[total - 1]]);
    if expected != found {
        let _ = resync(src, MAGIC.len());
        warn!(
            expected = format_args!("0x{expected:04X}"),
            found = format_args!("0x{found:04X}"),
            "frame checksum mismatch, dropping frame"
        );
        return Err(FrameError::Corrupt { expected, found });
    }

    let source = src[2];
    let msg_type = src[3];
    let seq = src[4];

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    src.advance(CRC_SIZE);

    Ok(Some(Packet {
        source,
        msg_type,
        seq,
        payload,
    }))
}

/// Drop `skip` bytes, then everything up to the next plausible frame magic.
/// Returns the number of bytes dropped.
fn resync(src: &mut BytesMut, skip: usize) -> usize {
    let mut dropped = skip.min(src.len());
    src.advance(dropped);
    while !src.is_empty() {
        if src[0] == MAGIC[0] && (src.len() < 2 || src[1] == MAGIC[1]) {
            break;
        }
        src.advance(1);
        dropped += 1;
    }
    dropped
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DEVICE_RADIO, DEVICE_TOUCH, MSG_NOTIFICATION, MSG_RADIO_DATA, MSG_STATUS_UPDATE,
    };

    fn encode_to_vec(packet: &Packet) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_packet(packet, &mut buf).unwrap();
        buf
    }

    #[test]
    fn encode_decode_roundtrip() {
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 42, &b"hello, chip!"[..]);
        let mut buf = encode_to_vec(&packet);

        assert_eq!(buf.len(), packet.wire_size());

        let decoded = decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload_roundtrip() {
        let packet = Packet::new(DEVICE_RADIO, MSG_STATUS_UPDATE, 0, Bytes::new());
        let mut buf = encode_to_vec(&packet);

        let decoded = decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn incomplete_header_needs_more_data() {
        let mut buf = BytesMut::from(&[MAGIC[0], MAGIC[1], 0x01][..]);
        assert!(decode_packet(&mut buf, MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn incomplete_payload_needs_more_data() {
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 1, &b"truncated"[..]);
        let mut buf = encode_to_vec(&packet);
        buf.truncate(HEADER_SIZE + 4);

        assert!(decode_packet(&mut buf, MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn payload_too_large_rejected_on_encode() {
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 0, vec![0u8; MAX_PAYLOAD + 1]);
        let mut buf = BytesMut::new();
        let err = encode_packet(&packet, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn oversized_length_byte_is_desync() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_slice(&[DEVICE_TOUCH, MSG_NOTIFICATION, 0, 0xFF]);

        let err = decode_packet(&mut buf, MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::Desync { .. }));
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 7, &b"payload"[..]);
        let mut buf = encode_to_vec(&packet);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let err = decode_packet(&mut buf, MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::Corrupt { .. }));
    }

    #[test]
    fn single_bit_flips_never_accepted() {
        // Flip every bit outside the length byte: the checksum must reject the
        // frame (or the magic scan must flag desync) — never accept it.
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 7, &b"bitflip"[..]);
        let wire = encode_to_vec(&packet);

        for byte in 0..wire.len() {
            if byte == 5 {
                continue; // length byte changes the declared frame extent
            }
            for bit in 0..8 {
                let mut flipped = BytesMut::from(&wire[..]);
                flipped[byte] ^= 1 << bit;

                match decode_packet(&mut flipped, MAX_PAYLOAD) {
                    Ok(Some(p)) => panic!("accepted corrupted frame (byte {byte} bit {bit}): {p:?}"),
                    Ok(None) | Err(_) => {}
                }
            }
        }
    }

    #[test]
    fn length_byte_flips_never_yield_the_original() {
        // A flipped length byte shifts the checksum window, so the decode may
        // legitimately stall waiting for bytes — but it must never reproduce
        // the packet that was sent.
        let packet = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 7, &b"hi"[..]);
        let wire = encode_to_vec(&packet);

        for bit in 0..8 {
            let mut flipped = BytesMut::from(&wire[..]);
            flipped[5] ^= 1 << bit;

            if let Ok(Some(p)) = decode_packet(&mut flipped, MAX_PAYLOAD) {
                assert_ne!(p, packet, "length flip (bit {bit}) reproduced the original");
            }
        }
    }

    #[test]
    fn garbage_then_frame_resynchronizes() {
        let packet = Packet::new(DEVICE_RADIO, MSG_STATUS_UPDATE, 3, &b"ok"[..]);
        let mut buf = BytesMut::from(&b"\x00\xde\xad\xbe\xef\xff"[..]);
        encode_packet(&packet, &mut buf).unwrap();

        let err = decode_packet(&mut buf, MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::Desync { dropped: 6 }));

        let decoded = decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn corrupt_frame_does_not_block_the_next() {
        let first = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 1, &b"first"[..]);
        let second = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 2, &b"second"[..]);

        let mut buf = encode_to_vec(&first);
        buf[HEADER_SIZE] ^= 0x55; // corrupt first frame's payload
        encode_packet(&second, &mut buf).unwrap();

        let err = decode_packet(&mut buf, MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::Corrupt { .. }));

        // Resynchronization lands on the second frame's magic.
        let decoded = decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, second);
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let a = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 1, &b"a"[..]);
        let b = Packet::new(DEVICE_RADIO, MSG_STATUS_UPDATE, 2, &b"b"[..]);

        let mut buf = encode_to_vec(&a);
        encode_packet(&b, &mut buf).unwrap();

        assert_eq!(decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap(), a);
        assert_eq!(decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap(), b);
        assert!(buf.is_empty());
    }

    #[test]
    fn max_payload_roundtrip() {
        let packet = Packet::new(DEVICE_TOUCH, MSG_RADIO_DATA, 255, vec![0xA5; MAX_PAYLOAD]);
        let mut buf = encode_to_vec(&packet);
        let decoded = decode_packet(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }
}
