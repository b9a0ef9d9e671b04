//! Service port resolution.
//!
//! The status-exchange port is looked up by name in `/etc/services` at
//! startup, the same database every other daemon on the host consults.
//! A missing entry is a startup error unless the port is pinned in the
//! configuration or on the command line.

use anyhow::{Context, Result, bail};
use std::fs;

/// System services database.
const SERVICES_PATH: &str = "/etc/services";

/// Resolve a service name to a port number for the given protocol.
pub fn lookup(name: &str, proto: &str) -> Result<u16> {
    let db = fs::read_to_string(SERVICES_PATH)
        .with_context(|| format!("Failed to read {SERVICES_PATH}"))?;

    match find_in(&db, name, proto) {
        Some(port) => Ok(port),
        None => bail!("service {name}/{proto} not found in {SERVICES_PATH}"),
    }
}

/// Scan a services database for `name` (or one of its aliases) over `proto`.
///
/// Entry format: `name  port/proto  [alias ...]`, `#` starts a comment.
fn find_in(db: &str, name: &str, proto: &str) -> Option<u16> {
    for line in db.lines() {
        let line = line.split('#').next().unwrap_or("");
        let mut fields = line.split_whitespace();

        let Some(service) = fields.next() else {
            continue;
        };
        let Some(port_proto) = fields.next() else {
            continue;
        };
        let Some((port, entry_proto)) = port_proto.split_once('/') else {
            continue;
        };

        if entry_proto != proto {
            continue;
        }
        if service == name || fields.any(|alias| alias == name) {
            return port.parse().ok();
        }
    }
    None
}
