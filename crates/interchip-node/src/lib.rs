//! Reliability, dispatch, and device addressing for the interchip protocol.
//!
//! This is the protocol core that sits between the frame codec and the
//! application glue on each chip. A [`Node`] owns one link, runs the receive
//! task, tracks every outstanding data send until its ACK/NACK arrives (with
//! timed retransmission), and routes inbound data frames to per-message-type
//! handlers on a bounded dispatch queue.

pub mod control;
pub mod dispatch;
pub mod error;
pub mod node;
pub mod registry;
pub mod reliability;

pub use control::{error_name, AckNack, ERR_OK, ERR_QUEUE_FULL, ERR_UNKNOWN_TYPE};
pub use dispatch::DispatchRouter;
pub use error::{NodeError, Result};
pub use node::{Node, NodeConfig};
pub use registry::DeviceRegistry;
pub use reliability::{Delivery, ReliabilityConfig, ReliabilityEngine, SendHandle};
