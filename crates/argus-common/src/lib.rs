//! # Argus Common
//!
//! Wire protocol and shared definitions used by the Argus daemon and its
//! spool readers.
//!
//! ## Modules
//! - `wire` - Status packet codec (HostStatus, SessionEntry) and validation
//! - `error` - Wire-level error types
//! - `constants` - Protocol and deployment constants

pub mod constants;
pub mod error;
pub mod wire;

pub use error::WireError;
pub use wire::{HostStatus, SessionEntry, hostname_is_valid};
