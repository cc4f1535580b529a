//! Byte-link transport abstraction for the interchip protocol.
//!
//! A [`LinkStream`] stands in for the physical UART/SPI connection between two
//! chips. When the chips run as host processes (simulation, integration
//! testing, bridging), the link is carried over a Unix domain socket; a real
//! serial driver plugs in at the same seam.
//!
//! This is the lowest layer of the stack. The protocol core never assumes the
//! link is reliable, ordered, or framed — everything above rebuilds those
//! properties.

pub mod error;
pub mod link;

#[cfg(unix)]
pub mod socket;

pub use error::{Result, TransportError};
pub use link::LinkStream;

#[cfg(unix)]
pub use socket::LinkSocket;
