//! # Roster - Argus spool reader
//!
//! Renders the spool kept by argusd as an uptime table: one line per
//! known host with its uptime, user count, and load averages, as the
//! daemon last heard them.
//!
//! ## Usage
//! ```bash
//! # One line per host
//! roster
//!
//! # Count idle users too, read a non-default spool
//! roster --all --spool-dir /tmp/argus-spool
//!
//! # Raw records for scripting
//! roster --json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use argus_common::constants::{ACTIVE_IDLE_SECS, DEFAULT_SPOOL_DIR, DOWN_AFTER_SECS, SPOOL_PREFIX};
use argus_common::wire::HostStatus;

/// Argus spool reader
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(author, version, about = "Show status of hosts on the local network", long_about = None)]
struct Args {
    /// Spool directory to read
    #[arg(short, long, default_value = DEFAULT_SPOOL_DIR)]
    spool_dir: PathBuf,

    /// Count all users, not just those active within the last hour
    #[arg(short, long)]
    all: bool,

    /// Emit the decoded records as JSON instead of the table
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let mut hosts = match read_spool(&args.spool_dir) {
        Ok(hosts) => hosts,
        Err(e) => {
            eprintln!("roster: {}: {}", args.spool_dir.display(), e);
            process::exit(1);
        }
    };
    hosts.sort_by(|a, b| a.hostname.cmp(&b.hostname));

    if args.json {
        match serde_json::to_string_pretty(&hosts) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("roster: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let now = chrono::Utc::now().timestamp();
    for host in &hosts {
        println!("{}", render_line(host, now, args.all));
    }
}

/// Decode every status file in the spool. Files that fail to decode are
/// reported on stderr and skipped, not fatal.
fn read_spool(dir: &Path) -> std::io::Result<Vec<HostStatus>> {
    let mut hosts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(SPOOL_PREFIX) {
            continue;
        }
        let raw = match fs::read(entry.path()) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("roster: {}: {}", entry.path().display(), e);
                continue;
            }
        };
        match HostStatus::decode(&raw) {
            Ok(status) => hosts.push(status),
            Err(e) => eprintln!("roster: {}: {}", entry.path().display(), e),
        }
    }
    Ok(hosts)
}

/// One table line: host, up/down with duration, user count, load.
///
/// A host whose last report is older than the down threshold shows how
/// long it has been silent instead of its stale snapshot.
fn render_line(host: &HostStatus, now: i64, all: bool) -> String {
    let age = now - i64::from(host.recv_time);
    if age > i64::from(DOWN_AFTER_SECS) {
        return format!("{:<12}{}", host.hostname, interval(age, "down"));
    }

    let users = host
        .sessions
        .iter()
        .filter(|s| all || s.idle_secs < ACTIVE_IDLE_SECS)
        .count();

    format!(
        "{:<12}{},  {} user{},  load {:.2}, {:.2}, {:.2}",
        host.hostname,
        interval(i64::from(host.uptime_secs()), "  up"),
        users,
        if users == 1 { "" } else { "s" },
        f64::from(host.load_avg[0]) / 100.0,
        f64::from(host.load_avg[1]) / 100.0,
        f64::from(host.load_avg[2]) / 100.0,
    )
}

/// Render a duration as `d+hh:mm`, rounded up to whole minutes, turning
/// into `??:??` once it stops being believable (negative or past 90 days).
fn interval(secs: i64, label: &str) -> String {
    if !(0..=90 * 24 * 60 * 60).contains(&secs) {
        return format!("   {label} ??:??");
    }
    let minutes = (secs + 59) / 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;
    let days = hours / 24;
    let hours = hours % 24;
    if days > 0 {
        format!("{label} {days:2}+{hours:02}:{minutes:02}")
    } else {
        format!("{label}    {hours:2}:{minutes:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_common::wire::SessionEntry;

    fn host(name: &str, recv_time: u32) -> HostStatus {
        let mut status = HostStatus::new(name, 1_700_000_000);
        status.send_time = recv_time;
        status.recv_time = recv_time;
        status.load_avg = [152, 98, 45];
        status
    }

    #[test]
    fn test_interval_rounds_up_to_minutes() {
        assert_eq!(interval(0, "  up"), "  up     0:00");
        assert_eq!(interval(61, "  up"), "  up     0:02");
        assert_eq!(interval(3700, "  up"), "  up     1:02");
    }

    #[test]
    fn test_interval_shows_days_past_24h() {
        let secs = 2 * 86400 + 3 * 3600 + 4 * 60;
        assert_eq!(interval(secs, "  up"), "  up  2+03:04");
    }

    #[test]
    fn test_interval_gives_up_outside_believable_range() {
        assert_eq!(interval(-5, "down"), "   down ??:??");
        assert_eq!(interval(91 * 86400, "  up"), "     up ??:??");
    }

    #[test]
    fn test_silent_host_renders_down_with_age() {
        let status = host("vega", 1_700_000_000);
        let now = 1_700_000_000 + i64::from(DOWN_AFTER_SECS) + 3600;
        let line = render_line(&status, now, false);
        assert!(line.starts_with("vega"));
        assert!(line.contains("down"));
        assert!(!line.contains("load"));
    }

    #[test]
    fn test_user_count_skips_idle_sessions_unless_all() {
        let mut status = host("vega", 1_700_100_000);
        status.boot_time = 1_700_000_000;
        status.sessions = vec![
            SessionEntry {
                line: "tty1".into(),
                user: "ada".into(),
                idle_secs: 30,
            },
            SessionEntry {
                line: "tty2".into(),
                user: "brad".into(),
                idle_secs: ACTIVE_IDLE_SECS + 1,
            },
        ];
        let now = i64::from(status.recv_time) + 60;

        assert!(render_line(&status, now, false).contains("1 user,"));
        assert!(render_line(&status, now, true).contains("2 users,"));
    }

    #[test]
    fn test_read_spool_skips_foreign_and_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("argus.vega"), host("vega", 7).encode()).unwrap();
        fs::write(dir.path().join("argus.junk"), b"not a status frame").unwrap();
        fs::write(dir.path().join("README"), b"hands off").unwrap();

        let hosts = read_spool(dir.path()).unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "vega");
    }
}
