use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use interchip_frame::{
    encode_packet, is_control, msg_type_name, FrameConfig, FrameError, Packet, PacketReader,
    PacketWriter, MAX_PAYLOAD, MSG_ACK, MSG_NACK,
};
use interchip_transport::LinkStream;
use tracing::{debug, info, warn};

use crate::control::{AckNack, ERR_OK, ERR_UNKNOWN_TYPE};
use crate::dispatch::DispatchRouter;
use crate::error::{NodeError, Result};
use crate::registry::DeviceRegistry;
use crate::reliability::{ReliabilityConfig, ReliabilityEngine, SendHandle};

/// Node behavior configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This chip's device id.
    pub own_id: u8,
    /// Device ids accepted as frame sources (defaults to the closed namespace).
    pub known_devices: Vec<u8>,
    /// ACK timeout and retry budget for tracked sends.
    pub reliability: ReliabilityConfig,
    /// Dispatch queue depth; a full queue drops the frame (sender retries).
    pub dispatch_queue_depth: usize,
    /// Interval between retransmission sweeps.
    pub sweep_interval: Duration,
    /// Upper bound on each blocking read, so the receive task can observe
    /// shutdown.
    pub read_timeout: Duration,
    /// Maximum accepted payload size.
    pub max_payload_size: usize,
}

impl NodeConfig {
    /// Default configuration for the given device id.
    pub fn for_device(own_id: u8) -> Self {
        Self {
            own_id,
            known_devices: interchip_frame::KNOWN_DEVICES.to_vec(),
            reliability: ReliabilityConfig::default(),
            dispatch_queue_depth: 32,
            sweep_interval: Duration::from_millis(25),
            read_timeout: Duration::from_millis(50),
            max_payload_size: MAX_PAYLOAD,
        }
    }
}

struct Shared {
    config: NodeConfig,
    registry: DeviceRegistry,
    reliability: Arc<ReliabilityEngine>,
    router: DispatchRouter,
    writer: Mutex<PacketWriter<LinkStream>>,
    running: AtomicBool,
}

impl Shared {
    fn writer(&self) -> MutexGuard<'_, PacketWriter<LinkStream>> {
        self.writer.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// One chip's end of the link.
///
/// Owns the receive task, the dispatch worker, and the retransmission sweep.
/// All tasks stop and are joined on [`Node::shutdown`] or drop.
pub struct Node {
    shared: Arc<Shared>,
    rx_task: Option<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
    sweep_task: Option<JoinHandle<()>>,
}

impl Node {
    /// Bring up the protocol on a connected link.
    ///
    /// Splits the link into read and write halves, applies the bounded read
    /// timeout, and spawns the three background tasks. Fails if the link
    /// cannot be cloned or its timeouts cannot be set.
    pub fn start(link: LinkStream, config: NodeConfig) -> Result<Self> {
        let read_half = link.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: Some(config.read_timeout),
            write_timeout: None,
        };

        let reader = PacketReader::with_config_link(read_half, frame_config.clone())?;
        let writer = PacketWriter::with_config_link(link, frame_config)?;

        let registry = DeviceRegistry::with_devices(config.own_id, &config.known_devices);
        let reliability = Arc::new(ReliabilityEngine::new(config.reliability.clone()));

        let (dispatch_tx, dispatch_rx) = sync_channel(config.dispatch_queue_depth);

        let shared = Arc::new(Shared {
            config,
            registry,
            reliability,
            router: DispatchRouter::new(),
            writer: Mutex::new(writer),
            running: AtomicBool::new(true),
        });

        let rx_task = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || receive_loop(&shared, reader, dispatch_tx))
        };
        let dispatch_task = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || dispatch_loop(&shared, dispatch_rx))
        };
        let sweep_task = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || sweep_loop(&shared))
        };

        info!(
            device = shared.registry.label(shared.config.own_id),
            id = format_args!("0x{:02X}", shared.config.own_id),
            "interchip node started"
        );

        Ok(Self {
            shared,
            rx_task: Some(rx_task),
            dispatch_task: Some(dispatch_task),
            sweep_task: Some(sweep_task),
        })
    }

    /// This chip's device id.
    pub fn own_id(&self) -> u8 {
        self.shared.config.own_id
    }

    /// Register the handler for a data message type (register-once).
    pub fn register_handler<F>(&self, msg_type: u8, handler: F) -> Result<()>
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.shared.router.register(msg_type, handler)
    }

    /// Send a data packet. Fire-and-forget at the transport level: the
    /// returned handle reports the eventual ACK/NACK/timeout outcome.
    ///
    /// Control types are refused — the dispatch router emits those itself.
    pub fn send(&self, dest: u8, msg_type: u8, payload: &[u8]) -> Result<SendHandle> {
        if is_control(msg_type) {
            return Err(NodeError::ControlSend(msg_type));
        }
        if !self.shared.registry.is_known(dest) || self.shared.registry.is_self(dest) {
            return Err(NodeError::InvalidDestination(dest));
        }
        if payload.len() > self.shared.config.max_payload_size {
            return Err(NodeError::Frame(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.shared.config.max_payload_size,
            }));
        }

        let seq = self.shared.reliability.allocate_seq(dest)?;
        let packet = Packet::new(self.shared.config.own_id, msg_type, seq, payload.to_vec());

        let mut buf = BytesMut::with_capacity(packet.wire_size());
        encode_packet(&packet, &mut buf)?;
        let frame = buf.freeze();

        let handle = self.shared.reliability.track(dest, seq, frame.clone());
        if let Err(err) = self.shared.writer().write_raw(&frame) {
            // Never leave a table entry for a frame that was not written.
            self.shared.reliability.cancel(dest, seq);
            return Err(err.into());
        }

        debug!(
            dest = self.shared.registry.label(dest),
            msg_type = msg_type_name(msg_type),
            seq,
            len = payload.len(),
            "sent data frame"
        );
        Ok(handle)
    }

    /// Number of sends currently awaiting acknowledgment.
    pub fn outstanding_sends(&self) -> usize {
        self.shared.reliability.outstanding()
    }

    /// Stop the background tasks and join them.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.rx_task.take() {
            let _ = task.join();
        }
        if let Some(task) = self.dispatch_task.take() {
            let _ = task.join();
        }
        if let Some(task) = self.sweep_task.take() {
            let _ = task.join();
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receive task: drains the link, resolves control frames, queues data frames.
///
/// No inbound error may wedge this loop — corrupt frames and unknown sources
/// are dropped and reading continues.
fn receive_loop(shared: &Shared, mut reader: PacketReader<LinkStream>, queue: SyncSender<Packet>) {
    while shared.running.load(Ordering::SeqCst) {
        match reader.read_packet() {
            Ok(packet) => handle_inbound(shared, packet, &queue),
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                // Idle tick; loop to re-check the running flag.
            }
            Err(FrameError::ConnectionClosed) => {
                info!("link closed by peer");
                break;
            }
            Err(err @ (FrameError::Corrupt { .. } | FrameError::Desync { .. })) => {
                warn!(%err, "dropping corrupt frame");
            }
            Err(err) => {
                warn!(%err, "receive task stopping on link error");
                break;
            }
        }
    }
}

fn handle_inbound(shared: &Shared, packet: Packet, queue: &SyncSender<Packet>) {
    if shared.registry.is_self(packet.source) {
        warn!(
            seq = packet.seq,
            "ignoring self-sourced frame (transport echo)"
        );
        return;
    }
    if !shared.registry.is_known(packet.source) {
        // Not NACKed: an unknown source cannot be trusted with a reply.
        warn!(
            source = format_args!("0x{:02X}", packet.source),
            seq = packet.seq,
            "dropping frame from unknown device"
        );
        return;
    }

    if is_control(packet.msg_type) {
        resolve_control(shared, &packet);
        return;
    }

    match queue.try_send(packet) {
        Ok(()) => {}
        Err(TrySendError::Full(dropped)) => {
            // No NACK either: the sender's retransmission recovers the frame.
            warn!(
                source = shared.registry.label(dropped.source),
                seq = dropped.seq,
                "dispatch queue full, dropping frame"
            );
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

fn resolve_control(shared: &Shared, packet: &Packet) {
    let ack = match AckNack::parse(&packet.payload) {
        Ok(ack) => ack,
        Err(err) => {
            warn!(%err, source = shared.registry.label(packet.source), "dropping malformed control frame");
            return;
        }
    };

    let resolved = match packet.msg_type {
        MSG_ACK => shared.reliability.resolve_ack(packet.source, ack.seq),
        _ => shared
            .reliability
            .resolve_nack(packet.source, ack.seq, ack.error_code),
    };
    if !resolved {
        debug!(
            source = shared.registry.label(packet.source),
            seq = ack.seq,
            "stale control frame for unknown send"
        );
    }
}

/// Dispatch worker: runs handlers off the receive task so a slow handler
/// cannot stall frame reception, and emits exactly one ACK or NACK per data
/// frame it sees.
fn dispatch_loop(shared: &Shared, queue: Receiver<Packet>) {
    // Last delivered packet per source, for duplicate suppression after a
    // lost ACK. A true retransmission is byte-identical (the sender replays
    // its stored frame bytes), so a frame that merely reuses a resolved
    // sequence number with different content is a new message, not a
    // duplicate.
    let mut last_delivered: std::collections::HashMap<u8, Packet> =
        std::collections::HashMap::new();

    while let Ok(packet) = queue.recv() {
        if last_delivered.get(&packet.source) == Some(&packet) {
            debug!(
                source = shared.registry.label(packet.source),
                seq = packet.seq,
                "duplicate delivery, re-acking without re-dispatch"
            );
            respond(shared, &packet, MSG_ACK, ERR_OK);
            continue;
        }

        match shared.router.handler_for(packet.msg_type) {
            Some(handler) => {
                handler(&packet);
                last_delivered.insert(packet.source, packet.clone());
                respond(shared, &packet, MSG_ACK, ERR_OK);
            }
            None => {
                warn!(
                    source = shared.registry.label(packet.source),
                    msg_type = format_args!("0x{:02X}", packet.msg_type),
                    seq = packet.seq,
                    "no handler for message type, nacking"
                );
                respond(shared, &packet, MSG_NACK, ERR_UNKNOWN_TYPE);
            }
        }
    }
}

fn respond(shared: &Shared, inbound: &Packet, msg_type: u8, error_code: u8) {
    let ack = AckNack {
        seq: inbound.seq,
        error_code,
    };
    let reply = Packet::new(
        shared.config.own_id,
        msg_type,
        inbound.seq,
        ack.to_bytes().to_vec(),
    );
    if let Err(err) = shared.writer().write_packet(&reply) {
        warn!(%err, dest = shared.registry.label(inbound.source), "failed to send control reply");
    }
}

/// Housekeeping task: periodic timeout sweep and retransmission.
fn sweep_loop(shared: &Shared) {
    while shared.running.load(Ordering::SeqCst) {
        std::thread::sleep(shared.config.sweep_interval);
        for frame in shared.reliability.sweep(Instant::now()) {
            if let Err(err) = shared.writer().write_raw(&frame) {
                warn!(%err, "retransmission failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interchip_frame::{DEVICE_DISPLAY, DEVICE_TOUCH, MSG_NOTIFICATION};

    fn quiet_config(own_id: u8) -> NodeConfig {
        NodeConfig {
            sweep_interval: Duration::from_millis(5),
            read_timeout: Duration::from_millis(10),
            ..NodeConfig::for_device(own_id)
        }
    }

    #[test]
    fn send_rejects_control_types() {
        let (link, _other) = LinkStream::pair().unwrap();
        let node = Node::start(link, quiet_config(DEVICE_TOUCH)).unwrap();

        let err = node.send(DEVICE_DISPLAY, MSG_ACK, &[]).unwrap_err();
        assert!(matches!(err, NodeError::ControlSend(MSG_ACK)));
    }

    #[test]
    fn send_rejects_unknown_destination() {
        let (link, _other) = LinkStream::pair().unwrap();
        let node = Node::start(link, quiet_config(DEVICE_TOUCH)).unwrap();

        let err = node.send(0x7E, MSG_NOTIFICATION, b"x").unwrap_err();
        assert!(matches!(err, NodeError::InvalidDestination(0x7E)));
    }

    #[test]
    fn send_rejects_self_destination() {
        let (link, _other) = LinkStream::pair().unwrap();
        let node = Node::start(link, quiet_config(DEVICE_TOUCH)).unwrap();

        let err = node.send(DEVICE_TOUCH, MSG_NOTIFICATION, b"x").unwrap_err();
        assert!(matches!(err, NodeError::InvalidDestination(DEVICE_TOUCH)));
    }

    #[test]
    fn send_rejects_oversized_payload() {
        let (link, _other) = LinkStream::pair().unwrap();
        let node = Node::start(link, quiet_config(DEVICE_TOUCH)).unwrap();

        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = node.send(DEVICE_DISPLAY, MSG_NOTIFICATION, &payload).unwrap_err();
        assert!(matches!(
            err,
            NodeError::Frame(FrameError::PayloadTooLarge { .. })
        ));
        assert_eq!(node.outstanding_sends(), 0);
    }

    #[test]
    fn shutdown_joins_tasks() {
        let (link, _other) = LinkStream::pair().unwrap();
        let node = Node::start(link, quiet_config(DEVICE_TOUCH)).unwrap();
        node.shutdown();
    }
}
