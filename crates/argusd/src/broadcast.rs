//! Periodic status broadcasting.
//!
//! The broadcaster owns the daemon context: every tick it refreshes the
//! local status record, stamps the send time, and fans the encoded frame
//! out to all resolved neighbors. A refresh request (SIGHUP) re-checks
//! the boot time and picks up newly appeared links. Failures that leave
//! the daemon unable to represent itself (the boot time moving, the
//! spool directory vanishing) end the task with an error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use sysinfo::System;
use tokio::net::UdpSocket;

use argus_common::constants::BOOT_REFRESH_TICKS;
use argus_common::wire::HostStatus;

use crate::neighbors::{self, Neighbor};
use crate::state::DaemonState;

/// Broadcast loop. The first tick fires immediately so neighbors hear
/// from this host at startup rather than one interval later.
pub async fn run(
    mut state: DaemonState,
    socket: Arc<UdpSocket>,
    spool_dir: PathBuf,
    interval: Duration,
    status_port: u16,
    mut refresh_rx: tokio::sync::mpsc::Receiver<()>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let mut timer = tokio::time::interval(interval);

    tracing::info!(
        interval = ?interval,
        neighbors = state.neighbors.len(),
        "📣 Status broadcaster started"
    );

    loop {
        tokio::select! {
            _ = timer.tick() => {
                if !spool_dir.is_dir() {
                    bail!("spool directory {} is gone", spool_dir.display());
                }
                let now = chrono::Utc::now().timestamp() as u32;
                let frame = tick(&mut state, now, boot_time_now())?;
                send_all(&socket, &state.neighbors, &frame).await;
            }
            Some(()) = refresh_rx.recv() => {
                refresh(&mut state, status_port)?;
            }
            _ = shutdown.recv() => {
                tracing::info!("📣 Status broadcaster shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One broadcast cycle: re-check the boot time on its cadence, collect
/// sessions and load, stamp the send time, encode.
fn tick(state: &mut DaemonState, now: u32, boot_now: u32) -> anyhow::Result<Vec<u8>> {
    if state.ticks % BOOT_REFRESH_TICKS == 0 {
        verify_boot_time(&state.status, boot_now)?;
    }
    state.ticks += 1;

    state.collector.collect(&mut state.status, now);
    state.status.send_time = now;
    tracing::debug!(
        sessions = state.status.sessions.len(),
        rescans = state.collector.rescans(),
        "Status collected"
    );
    Ok(state.status.encode())
}

/// The boot time fixed at startup must still be what the OS reports; a
/// daemon whose identity drifted cannot report itself truthfully.
fn verify_boot_time(status: &HostStatus, boot_now: u32) -> anyhow::Result<()> {
    if boot_now == 0 {
        bail!("boot time lookup failed");
    }
    if boot_now != status.boot_time {
        bail!(
            "boot time changed from {} to {}",
            status.boot_time,
            boot_now
        );
    }
    Ok(())
}

/// Refresh request: boot time re-verified (fatal on drift), link list
/// extended with anything that appeared since startup (non-fatal).
fn refresh(state: &mut DaemonState, status_port: u16) -> anyhow::Result<()> {
    tracing::info!("Refresh requested: re-checking boot time and links");
    verify_boot_time(&state.status, boot_time_now())?;

    match neighbors::discover(state.neighbors.clone(), status_port) {
        Ok(merged) => {
            if merged.len() > state.neighbors.len() {
                tracing::info!(added = merged.len() - state.neighbors.len(), "New links resolved");
            }
            state.neighbors = merged;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Link re-discovery failed, keeping current set");
        }
    }

    Ok(())
}

async fn send_all(socket: &UdpSocket, neighbors: &[Neighbor], frame: &[u8]) {
    for neighbor in neighbors {
        if let Err(e) = socket.send_to(frame, neighbor.dest).await {
            tracing::warn!(
                link = %neighbor.link,
                dest = %neighbor.dest,
                error = %e,
                "Failed to send status"
            );
        }
    }
}

/// Kernel boot time in epoch seconds; zero when the reading is unusable.
fn boot_time_now() -> u32 {
    u32::try_from(System::boot_time()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SessionCollector;

    const BOOT: u32 = 1_700_000_000;

    fn test_state(dir: &std::path::Path) -> DaemonState {
        let collector = SessionCollector::new(dir.join("utmp"), dir);
        DaemonState::new(HostStatus::new("vega", BOOT), collector, Vec::new())
    }

    #[test]
    fn test_tick_stamps_send_time_and_encodes_current_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());

        let frame = tick(&mut state, BOOT + 600, BOOT).unwrap();
        let decoded = HostStatus::decode(&frame).unwrap();

        assert_eq!(decoded.hostname, "vega");
        assert_eq!(decoded.boot_time, BOOT);
        assert_eq!(decoded.send_time, BOOT + 600);
        assert_eq!(decoded.recv_time, 0);
    }

    #[test]
    fn test_boot_time_checked_on_first_and_eleventh_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());

        // Tick 1 verifies; a matching reading passes.
        tick(&mut state, BOOT + 180, BOOT).unwrap();

        // Ticks 2-10 skip the check, so a drifted reading goes unnoticed.
        for i in 2..=10 {
            tick(&mut state, BOOT + 180 * i, BOOT + 5).unwrap();
        }

        // Tick 11 is back on the cadence and the drift is fatal.
        assert!(tick(&mut state, BOOT + 1980, BOOT + 5).is_err());
    }

    #[test]
    fn test_boot_time_mismatch_and_lookup_failure_are_fatal() {
        let dir = tempfile::tempdir().unwrap();

        let mut state = test_state(dir.path());
        assert!(tick(&mut state, BOOT + 180, BOOT + 99).is_err());

        let mut state = test_state(dir.path());
        assert!(tick(&mut state, BOOT + 180, 0).is_err());
    }
}
