//! Inbound status handling.
//!
//! Every datagram runs the same gauntlet: source port check, decode,
//! hostname validation, then a receive-time stamp and a spool write.
//! Failures anywhere on this path drop the packet with a warning and
//! the loop keeps listening; nothing here is fatal.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use argus_common::hostname_is_valid;
use argus_common::wire::{HostStatus, MAX_PACKET};

use crate::store::PeerStore;

/// Receive loop over the shared status socket, running until shutdown.
pub async fn run(
    socket: Arc<UdpSocket>,
    store: PeerStore,
    status_port: u16,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    // Sized to the protocol bound: anything larger is truncated by the
    // kernel and the ragged tail falls off in decode.
    let mut buf = vec![0u8; MAX_PACKET];

    tracing::info!(spool = %store.dir().display(), "👂 Status receiver started");

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, from)) => {
                        let now = chrono::Utc::now().timestamp() as u32;
                        handle_datagram(&store, status_port, &buf[..len], from, now);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Receive error");
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("👂 Status receiver shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Gate one datagram through the validation chain and spool it.
fn handle_datagram(store: &PeerStore, status_port: u16, frame: &[u8], from: SocketAddr, now: u32) {
    if from.port() != status_port {
        tracing::warn!(peer = %from, port = from.port(), "Dropping packet from bad source port");
        return;
    }

    let mut status = match HostStatus::decode(frame) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(peer = %from, error = %e, "Dropping undecodable packet");
            return;
        }
    };

    if !hostname_is_valid(&status.hostname) {
        tracing::warn!(peer = %from, hostname = ?status.hostname, "Dropping packet with malformed hostname");
        return;
    }

    status.recv_time = now;
    match store.persist(&status.hostname, &status.encode()) {
        Ok(()) => {
            tracing::debug!(
                host = %status.hostname,
                sessions = status.sessions.len(),
                "Status spooled"
            );
        }
        Err(e) => {
            tracing::warn!(host = %status.hostname, error = %e, "Failed to spool status");
        }
    }
}
