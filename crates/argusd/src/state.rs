//! Daemon context.
//!
//! Everything the broadcast side mutates lives in one owned value: the
//! host's own status record, the session collector feeding it, the
//! resolved neighbor list, and the tick counter. The value moves into
//! the broadcaster task; the receive side never touches it.

use argus_common::wire::HostStatus;

use crate::collector::SessionCollector;
use crate::neighbors::Neighbor;

/// Mutable state owned by the broadcaster task
pub struct DaemonState {
    /// This host's snapshot, rebuilt every tick
    pub status: HostStatus,

    /// Session source reader with its staleness cache
    pub collector: SessionCollector,

    /// Send destinations, one per usable link
    pub neighbors: Vec<Neighbor>,

    /// Ticks completed since startup; drives the boot-time re-check cadence
    pub ticks: u64,
}

impl DaemonState {
    pub fn new(status: HostStatus, collector: SessionCollector, neighbors: Vec<Neighbor>) -> Self {
        Self {
            status,
            collector,
            neighbors,
            ticks: 0,
        }
    }
}
