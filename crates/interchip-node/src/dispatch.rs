//! Per-message-type handler registry.
//!
//! Replaces the classic switch-on-type callback with a dispatch table: an
//! unregistered type is a structurally detectable miss (the router NACKs it)
//! rather than a silent fallthrough. Registration is register-once — handler
//! replacement is rejected, not silently applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use interchip_frame::{is_control, Packet};

use crate::error::{NodeError, Result};

/// A registered message handler.
///
/// Invoked with the full decoded packet on the dispatch worker; any context
/// the handler needs is captured by the closure. Handlers must not block for
/// long — they share one worker — and must not call back into the node's send
/// path destructively.
pub type Handler = Arc<dyn Fn(&Packet) + Send + Sync + 'static>;

/// Handler table keyed by message type.
#[derive(Default)]
pub struct DispatchRouter {
    handlers: Mutex<HashMap<u8, Handler>>,
}

impl DispatchRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u8, Handler>> {
        self.handlers.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Register a handler for a data message type.
    ///
    /// Control types belong to the reliability layer and are refused; a
    /// second registration for the same type is refused with
    /// [`NodeError::HandlerExists`].
    pub fn register<F>(&self, msg_type: u8, handler: F) -> Result<()>
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        if is_control(msg_type) {
            return Err(NodeError::ControlSend(msg_type));
        }
        let mut handlers = self.lock();
        if handlers.contains_key(&msg_type) {
            return Err(NodeError::HandlerExists(msg_type));
        }
        handlers.insert(msg_type, Arc::new(handler));
        Ok(())
    }

    /// Look up the handler for a message type.
    ///
    /// The returned handler is cloned out so no lock is held while it runs.
    pub fn handler_for(&self, msg_type: u8) -> Option<Handler> {
        self.lock().get(&msg_type).cloned()
    }

    /// True if a handler is registered for the type.
    pub fn is_registered(&self, msg_type: u8) -> bool {
        self.lock().contains_key(&msg_type)
    }
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<u8> = self.lock().keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("DispatchRouter")
            .field("registered_types", &types)
            .finish()
    }
}
