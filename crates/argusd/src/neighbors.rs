//! Network link discovery.
//!
//! Builds the list of destinations a status broadcast goes to: one per
//! local link that is up and supports broadcast or point-to-point
//! addressing. Discovery runs at startup and again on SIGHUP; re-runs
//! only add links, previously resolved entries are kept as-is.

use anyhow::{Context, Result};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// One send destination resolved from a local link.
#[derive(Debug, Clone)]
pub struct Neighbor {
    /// Link the destination was resolved from
    pub link: String,
    /// Broadcast or point-to-point peer address, status port attached
    pub dest: SocketAddr,
    /// Flags the link carried at resolution time
    pub flags: InterfaceFlags,
}

/// Address snapshot of one enumerated link, before filtering.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub flags: InterfaceFlags,
    pub broadcast: Option<Ipv4Addr>,
    pub peer: Option<Ipv4Addr>,
}

/// Enumerate local links and merge the usable ones into `existing`.
///
/// Enumeration failure is the caller's problem (fatal at startup, a
/// warning on re-discovery); per-link gaps are only logged here.
pub fn discover(existing: Vec<Neighbor>, port: u16) -> Result<Vec<Neighbor>> {
    let links = enumerate().context("Failed to enumerate network links")?;
    Ok(merge_links(existing, links, port))
}

/// Snapshot the IPv4 rows of the interface table.
fn enumerate() -> Result<Vec<Link>> {
    let addrs = getifaddrs().context("getifaddrs failed")?;

    let mut links = Vec::new();
    for ifa in addrs {
        // getifaddrs yields one row per address family; only the IPv4
        // row carries addresses this protocol can use.
        if ifa.address.as_ref().and_then(|a| a.as_sockaddr_in()).is_none() {
            continue;
        }

        links.push(Link {
            name: ifa.interface_name.clone(),
            flags: ifa.flags,
            broadcast: ifa
                .broadcast
                .as_ref()
                .and_then(|a| a.as_sockaddr_in())
                .map(|sin| sin.ip()),
            peer: ifa
                .destination
                .as_ref()
                .and_then(|a| a.as_sockaddr_in())
                .map(|sin| sin.ip()),
        });
    }

    Ok(links)
}

/// Fold enumerated links into the neighbor list.
///
/// Links already present by name are left untouched, so repeated calls
/// never produce duplicates or rewrite resolved destinations.
pub fn merge_links(mut neighbors: Vec<Neighbor>, links: Vec<Link>, port: u16) -> Vec<Neighbor> {
    for link in links {
        if neighbors.iter().any(|n| n.link == link.name) {
            continue;
        }
        if !link.flags.contains(InterfaceFlags::IFF_UP) {
            tracing::debug!(link = %link.name, "Skipping link: not up");
            continue;
        }

        let broadcast_capable = link.flags.contains(InterfaceFlags::IFF_BROADCAST);
        let ptp_capable = link.flags.contains(InterfaceFlags::IFF_POINTOPOINT);
        if !broadcast_capable && !ptp_capable {
            tracing::debug!(link = %link.name, "Skipping link: no broadcast or peer path");
            continue;
        }

        // Broadcast address preferred when a link carries both flags.
        let mut dest = None;
        if ptp_capable {
            dest = link.peer;
        }
        if broadcast_capable {
            dest = link.broadcast.or(dest);
        }

        let Some(ip) = dest else {
            tracing::warn!(link = %link.name, "Link has no usable destination address, skipped");
            continue;
        };

        let neighbor = Neighbor {
            link: link.name,
            dest: SocketAddr::new(IpAddr::V4(ip), port),
            flags: link.flags,
        };
        tracing::info!(
            link = %neighbor.link,
            dest = %neighbor.dest,
            flags = ?neighbor.flags,
            "Link resolved"
        );
        neighbors.push(neighbor);
    }

    neighbors
}
