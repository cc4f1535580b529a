//! Outstanding-send tracking: sequence allocation, ACK/NACK reconciliation,
//! and timed retransmission.
//!
//! Only data-bearing message types are tracked; control frames are never
//! acknowledged, so an ACK of an ACK cannot occur. Each tracked send moves
//! through `Sent -> (Retrying ->)* Acked | Nacked | TimedOut`, with the
//! terminal state reported through a one-shot channel to the [`SendHandle`]
//! the caller received at send time.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{NodeError, Result};

/// Terminal result of a tracked send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The destination acknowledged the frame.
    Acked,
    /// The destination rejected the frame with the given error code.
    Nacked { code: u8 },
    /// No ACK/NACK arrived within the retry budget.
    TimedOut,
    /// The send was canceled by its owner.
    Canceled,
}

/// Retry/timeout policy for tracked sends.
#[derive(Debug, Clone)]
pub struct ReliabilityConfig {
    /// How long to wait for an ACK/NACK before retransmitting.
    pub ack_timeout: Duration,
    /// Retransmissions before the send is reported as [`Delivery::TimedOut`].
    pub max_retries: u8,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(250),
            max_retries: 3,
        }
    }
}

/// Bookkeeping for one transmitted data frame awaiting acknowledgment.
struct Outstanding {
    /// Encoded frame bytes, kept for verbatim retransmission.
    frame: Bytes,
    sent_at: Instant,
    retries: u8,
    notify: SyncSender<Delivery>,
}

#[derive(Default)]
struct Table {
    /// At most one entry per (destination, sequence) pair.
    outstanding: HashMap<(u8, u8), Outstanding>,
    /// Next sequence number per destination, wraps modulo 256.
    next_seq: HashMap<u8, u8>,
}

/// The outstanding-send table shared by the send path, the receive task, and
/// the retry sweep.
pub struct ReliabilityEngine {
    table: Mutex<Table>,
    config: ReliabilityConfig,
}

impl ReliabilityEngine {
    pub fn new(config: ReliabilityConfig) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // The table stays consistent even if a holder panicked mid-update;
        // recover rather than poisoning every later send.
        self.table.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Allocate the next sequence number for a destination.
    ///
    /// Refuses with [`NodeError::SequenceExhausted`] when the number about to
    /// be reused still has an unresolved outstanding entry.
    pub fn allocate_seq(&self, dest: u8) -> Result<u8> {
        let mut table = self.lock();
        let seq = table.next_seq.get(&dest).copied().unwrap_or(0);
        if table.outstanding.contains_key(&(dest, seq)) {
            return Err(NodeError::SequenceExhausted { dest, seq });
        }
        table.next_seq.insert(dest, seq.wrapping_add(1));
        Ok(seq)
    }

    /// Record an outstanding entry for an already-encoded frame and hand back
    /// the handle its result will be reported through.
    pub fn track(self: &Arc<Self>, dest: u8, seq: u8, frame: Bytes) -> SendHandle {
        let (notify, result) = sync_channel(1);
        self.lock().outstanding.insert(
            (dest, seq),
            Outstanding {
                frame,
                sent_at: Instant::now(),
                retries: 0,
                notify,
            },
        );
        SendHandle {
            dest,
            seq,
            engine: Arc::clone(self),
            result,
            resolved: None,
        }
    }

    /// Resolve an inbound ACK against the table. Returns false for a stale or
    /// unknown (source, seq) pair.
    pub fn resolve_ack(&self, source: u8, seq: u8) -> bool {
        self.resolve(source, seq, Delivery::Acked)
    }

    /// Resolve an inbound NACK, surfacing its error code to the sender.
    pub fn resolve_nack(&self, source: u8, seq: u8, code: u8) -> bool {
        self.resolve(source, seq, Delivery::Nacked { code })
    }

    fn resolve(&self, source: u8, seq: u8, delivery: Delivery) -> bool {
        match self.lock().outstanding.remove(&(source, seq)) {
            Some(entry) => {
                // The handle may already be gone; delivery is best-effort.
                let _ = entry.notify.try_send(delivery);
                true
            }
            None => false,
        }
    }

    /// Remove an entry without reporting a terminal error.
    pub fn cancel(&self, dest: u8, seq: u8) -> bool {
        self.lock().outstanding.remove(&(dest, seq)).is_some()
    }

    /// Timeout sweep: returns the frames due for retransmission and resolves
    /// entries whose retry budget is exhausted as [`Delivery::TimedOut`].
    pub fn sweep(&self, now: Instant) -> Vec<Bytes> {
        let mut retransmit = Vec::new();
        let mut expired = Vec::new();

        let mut table = self.lock();
        for (key, entry) in table.outstanding.iter_mut() {
            if now.duration_since(entry.sent_at) < self.config.ack_timeout {
                continue;
            }
            if entry.retries >= self.config.max_retries {
                expired.push(*key);
            } else {
                entry.retries += 1;
                entry.sent_at = now;
                debug!(
                    dest = format_args!("0x{:02X}", key.0),
                    seq = key.1,
                    attempt = entry.retries,
                    "retransmitting unacknowledged frame"
                );
                retransmit.push(entry.frame.clone());
            }
        }

        for key in expired {
            if let Some(entry) = table.outstanding.remove(&key) {
                warn!(
                    dest = format_args!("0x{:02X}", key.0),
                    seq = key.1,
                    retries = entry.retries,
                    "send timed out, giving up"
                );
                let _ = entry.notify.try_send(Delivery::TimedOut);
            }
        }

        retransmit
    }

    /// Number of sends currently awaiting acknowledgment.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding.len()
    }
}

/// Owner's handle to one tracked send.
///
/// Sending is fire-and-forget; the handle lets a caller optionally block for
/// the result (with its own timeout, holding no engine lock) or cancel
/// tracking entirely.
pub struct SendHandle {
    dest: u8,
    seq: u8,
    engine: Arc<ReliabilityEngine>,
    result: Receiver<Delivery>,
    resolved: Option<Delivery>,
}

impl SendHandle {
    /// Destination device of the tracked send.
    pub fn dest(&self) -> u8 {
        self.dest
    }

    /// Sequence number assigned to the tracked send.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Block until the send resolves or `timeout` elapses.
    ///
    /// Returns `None` while the send is still in flight.
    pub fn wait(&mut self, timeout: Duration) -> Option<Delivery> {
        if let Some(delivery) = self.resolved {
            return Some(delivery);
        }
        match self.result.recv_timeout(timeout) {
            Ok(delivery) => {
                self.resolved = Some(delivery);
                Some(delivery)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.resolved = Some(Delivery::Canceled);
                Some(Delivery::Canceled)
            }
        }
    }

    /// Non-blocking poll of the send's status.
    pub fn try_status(&mut self) -> Option<Delivery> {
        if let Some(delivery) = self.resolved {
            return Some(delivery);
        }
        match self.result.try_recv() {
            Ok(delivery) => {
                self.resolved = Some(delivery);
                Some(delivery)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.resolved = Some(Delivery::Canceled);
                Some(Delivery::Canceled)
            }
        }
    }

    /// Stop tracking this send without a terminal error.
    pub fn cancel(self) {
        self.engine.cancel(self.dest, self.seq);
    }
}

impl std::fmt::Debug for SendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendHandle")
            .field("dest", &format_args!("0x{:02X}", self.dest))
            .field("seq", &self.seq)
            .field("resolved", &self.resolved)
            .finish()
    }
}
