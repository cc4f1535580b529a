//! End-to-end exchanges between two nodes over an in-process loopback link,
//! plus raw-wire probes that inject hand-built frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use interchip_frame::{
    encode_packet, FrameConfig, FrameError, Packet, PacketReader, PacketWriter, DEVICE_DISPLAY,
    DEVICE_RADIO, DEVICE_TOUCH, MSG_ACK, MSG_NACK, MSG_NOTIFICATION, MSG_RADIO_DATA,
    MSG_TOUCH_EVENT,
};
use interchip_node::{Delivery, Node, NodeConfig, ReliabilityConfig, ERR_OK, ERR_UNKNOWN_TYPE};
use interchip_transport::LinkStream;

fn fast_config(own_id: u8) -> NodeConfig {
    NodeConfig {
        reliability: ReliabilityConfig {
            ack_timeout: Duration::from_millis(40),
            max_retries: 2,
        },
        sweep_interval: Duration::from_millis(10),
        read_timeout: Duration::from_millis(10),
        ..NodeConfig::for_device(own_id)
    }
}

/// Reader for the bare end of a link, with a bounded read timeout.
fn raw_reader(stream: LinkStream) -> PacketReader<LinkStream> {
    let config = FrameConfig {
        read_timeout: Some(Duration::from_millis(300)),
        ..FrameConfig::default()
    };
    PacketReader::with_config_link(stream, config).expect("raw reader should build")
}

/// Drain every packet that arrives before the read timeout.
fn drain(reader: &mut PacketReader<LinkStream>) -> Vec<Packet> {
    let mut packets = Vec::new();
    loop {
        match reader.read_packet() {
            Ok(packet) => packets.push(packet),
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break
            }
            Err(other) => panic!("unexpected read error: {other}"),
        }
    }
    packets
}

fn encoded(packet: &Packet) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_packet(packet, &mut buf).expect("encode should succeed");
    buf
}

#[test]
fn notification_is_delivered_once_and_acked() {
    let (touch_link, display_link) = LinkStream::pair().unwrap();
    let touch = Node::start(touch_link, fast_config(DEVICE_TOUCH)).unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    let seen_payload = Arc::new(Mutex::new(Vec::new()));
    {
        let deliveries = Arc::clone(&deliveries);
        let seen_payload = Arc::clone(&seen_payload);
        display
            .register_handler(MSG_NOTIFICATION, move |packet| {
                deliveries.fetch_add(1, Ordering::SeqCst);
                seen_payload.lock().unwrap().extend_from_slice(&packet.payload);
            })
            .unwrap();
    }

    let mut handle = touch
        .send(DEVICE_DISPLAY, MSG_NOTIFICATION, b"Interchip comm is active!")
        .unwrap();

    assert_eq!(
        handle.wait(Duration::from_secs(2)),
        Some(Delivery::Acked),
        "display should ack the notification"
    );
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    assert_eq!(
        seen_payload.lock().unwrap().as_slice(),
        b"Interchip comm is active!"
    );
    assert_eq!(touch.outstanding_sends(), 0);

    display.shutdown();
    touch.shutdown();
}

#[test]
fn unregistered_type_is_nacked_and_no_handler_fires() {
    let (touch_link, display_link) = LinkStream::pair().unwrap();
    let touch = Node::start(touch_link, fast_config(DEVICE_TOUCH)).unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = Arc::clone(&deliveries);
        display
            .register_handler(MSG_NOTIFICATION, move |_| {
                deliveries.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    // 0x7F is not part of the message namespace and nothing registered it.
    let mut handle = touch.send(DEVICE_DISPLAY, 0x7F, b"mystery").unwrap();

    assert_eq!(
        handle.wait(Duration::from_secs(2)),
        Some(Delivery::Nacked {
            code: ERR_UNKNOWN_TYPE
        })
    );
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);
    assert_eq!(touch.outstanding_sends(), 0);
}

#[test]
fn silent_peer_times_out_after_retries() {
    let (touch_link, silent_end) = LinkStream::pair().unwrap();
    let touch = Node::start(touch_link, fast_config(DEVICE_TOUCH)).unwrap();

    let mut handle = touch
        .send(DEVICE_DISPLAY, MSG_NOTIFICATION, b"anyone there?")
        .unwrap();

    assert_eq!(
        handle.wait(Duration::from_secs(2)),
        Some(Delivery::TimedOut)
    );
    assert_eq!(touch.outstanding_sends(), 0, "no dangling table entry");

    // The wire saw the original transmission plus both retries, unchanged.
    let mut reader = raw_reader(silent_end);
    let copies = drain(&mut reader);
    assert_eq!(copies.len(), 3);
    assert!(copies.iter().all(|p| p == &copies[0]));
}

#[test]
fn self_sourced_frames_never_reach_a_handler() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = Arc::clone(&deliveries);
        display
            .register_handler(MSG_NOTIFICATION, move |_| {
                deliveries.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    // Forged frame claiming to come from the display itself (transport echo).
    let forged = Packet::new(DEVICE_DISPLAY, MSG_NOTIFICATION, 1, &b"echo"[..]);
    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    writer.write_raw(&encoded(&forged)).unwrap();

    // Dropped silently: no dispatch and no ACK/NACK back on the wire.
    let mut reader = raw_reader(probe_end);
    assert!(drain(&mut reader).is_empty());
    assert_eq!(deliveries.load(Ordering::SeqCst), 0);

    // The link itself is still healthy afterwards.
    let valid = Packet::new(DEVICE_TOUCH, MSG_NOTIFICATION, 2, &b"real"[..]);
    writer.write_raw(&encoded(&valid)).unwrap();
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].msg_type, MSG_ACK);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_source_is_dropped_without_nack() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();
    display.register_handler(MSG_NOTIFICATION, |_| {}).unwrap();

    let forged = Packet::new(0x66, MSG_NOTIFICATION, 3, &b"who?"[..]);
    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    writer.write_raw(&encoded(&forged)).unwrap();

    let mut reader = raw_reader(probe_end);
    assert!(
        drain(&mut reader).is_empty(),
        "an untrusted source must not be answered"
    );
}

#[test]
fn unknown_type_from_wire_gets_exactly_one_nack() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();
    display.register_handler(MSG_NOTIFICATION, |_| {}).unwrap();

    let frame = Packet::new(DEVICE_TOUCH, 0xFF, 7, &b""[..]);
    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    writer.write_raw(&encoded(&frame)).unwrap();

    let mut reader = raw_reader(probe_end);
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].msg_type, MSG_NACK);
    assert_eq!(replies[0].source, DEVICE_DISPLAY);
    assert_eq!(replies[0].seq, 7);
    assert_eq!(replies[0].payload.as_ref(), &[7, ERR_UNKNOWN_TYPE]);
}

#[test]
fn duplicate_delivery_is_reacked_but_dispatched_once() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = Arc::clone(&deliveries);
        display
            .register_handler(MSG_TOUCH_EVENT, move |_| {
                deliveries.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    // Same frame twice, as a sender whose ACK got lost would retransmit it.
    let frame = encoded(&Packet::new(DEVICE_TOUCH, MSG_TOUCH_EVENT, 5, &b"tap"[..]));
    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    writer.write_raw(&frame).unwrap();
    writer.write_raw(&frame).unwrap();

    let mut reader = raw_reader(probe_end);
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 2, "each delivery is answered");
    for reply in &replies {
        assert_eq!(reply.msg_type, MSG_ACK);
        assert_eq!(reply.payload.as_ref(), &[5, ERR_OK]);
    }
    assert_eq!(deliveries.load(Ordering::SeqCst), 1, "handler ran once");
}

#[test]
fn new_payload_on_a_reused_seq_is_dispatched() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    let payloads = Arc::new(Mutex::new(Vec::new()));
    {
        let deliveries = Arc::clone(&deliveries);
        let payloads = Arc::clone(&payloads);
        display
            .register_handler(MSG_NOTIFICATION, move |packet| {
                deliveries.fetch_add(1, Ordering::SeqCst);
                payloads.lock().unwrap().push(packet.payload.to_vec());
            })
            .unwrap();
    }

    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    let mut reader = raw_reader(probe_end);

    // A fresh sender whose counter restarted lands on an already-resolved
    // sequence number. Same seq, different content: a new message.
    writer
        .write_raw(&encoded(&Packet::new(
            DEVICE_TOUCH,
            MSG_NOTIFICATION,
            0,
            &b"first"[..],
        )))
        .unwrap();
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].msg_type, MSG_ACK);

    writer
        .write_raw(&encoded(&Packet::new(
            DEVICE_TOUCH,
            MSG_NOTIFICATION,
            0,
            &b"second, distinct"[..],
        )))
        .unwrap();
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].msg_type, MSG_ACK);
    assert_eq!(replies[0].payload.as_ref(), &[0, ERR_OK]);

    assert_eq!(deliveries.load(Ordering::SeqCst), 2, "both messages handled");
    assert_eq!(
        payloads.lock().unwrap().as_slice(),
        &[b"first".to_vec(), b"second, distinct".to_vec()]
    );
}

#[test]
fn corrupt_bytes_do_not_wedge_the_receiver() {
    let (probe_end, display_link) = LinkStream::pair().unwrap();
    let display = Node::start(display_link, fast_config(DEVICE_DISPLAY)).unwrap();

    let deliveries = Arc::new(AtomicUsize::new(0));
    {
        let deliveries = Arc::clone(&deliveries);
        display
            .register_handler(MSG_RADIO_DATA, move |_| {
                deliveries.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let mut corrupted = encoded(&Packet::new(DEVICE_RADIO, MSG_RADIO_DATA, 1, &b"bad"[..]));
    let len = corrupted.len();
    corrupted[len - 1] ^= 0xFF;

    let good = encoded(&Packet::new(DEVICE_RADIO, MSG_RADIO_DATA, 2, &b"good"[..]));

    let mut writer = PacketWriter::new(probe_end.try_clone().unwrap());
    writer.write_raw(b"\x00\x11\x22").unwrap();
    writer.write_raw(&corrupted).unwrap();
    writer.write_raw(&good).unwrap();

    let mut reader = raw_reader(probe_end);
    let replies = drain(&mut reader);
    assert_eq!(replies.len(), 1, "only the intact frame is answered");
    assert_eq!(replies[0].msg_type, MSG_ACK);
    assert_eq!(replies[0].seq, 2);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
}
