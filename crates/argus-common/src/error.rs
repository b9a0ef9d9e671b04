//! Common error types for Argus components.

use thiserror::Error;

use crate::wire::{HEADER_LEN, PACKET_TYPE_STATUS, WIRE_VERSION};

/// Ways an inbound datagram can fail to decode.
///
/// Each rejection keeps the offending value so the receive loop can log
/// something more useful than "bad packet".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Shorter than the fixed header
    #[error("packet too short: {len} bytes, header is {HEADER_LEN}")]
    Truncated { len: usize },

    /// Version tag does not match the supported protocol version
    #[error("unsupported protocol version {found}, expected {WIRE_VERSION}")]
    Version { found: u8 },

    /// Type tag is not a status packet
    #[error("unexpected packet type {found}, expected {PACKET_TYPE_STATUS}")]
    Type { found: u8 },
}
