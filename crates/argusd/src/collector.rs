//! Local status collection.
//!
//! Fills the daemon's own status record each broadcast tick: active
//! sessions from the login database, per-terminal idle times, and load
//! averages. The session source is only re-parsed when its mtime or
//! size changed since the last pass; idle times and loads refresh every
//! tick regardless.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sysinfo::System;

use argus_common::wire::{
    HostStatus, MAX_SESSIONS, SESSION_LINE_LEN, SESSION_USER_LEN, SessionEntry,
};

// utmp record layout (glibc utmpx, fixed 384-byte records). Fields are
// read at explicit offsets; the on-disk struct is never overlaid.
const UTMP_RECORD_LEN: usize = 384;
const UT_LINE_OFFSET: usize = 8;
const UT_LINE_LEN: usize = 32;
const UT_USER_OFFSET: usize = 44;
const UT_USER_LEN: usize = 32;

/// ut_type value marking a live login session
const USER_PROCESS: i16 = 7;

/// Gathers this host's sessions and load into the shared status record.
pub struct SessionCollector {
    source: PathBuf,
    device_dir: PathBuf,
    /// mtime and size of the source at the last successful parse
    cache_stamp: Option<(SystemTime, u64)>,
    rescans: u64,
}

impl SessionCollector {
    pub fn new(source: impl Into<PathBuf>, device_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            device_dir: device_dir.into(),
            cache_stamp: None,
            rescans: 0,
        }
    }

    /// How many times the session source has actually been re-parsed.
    pub fn rescans(&self) -> u64 {
        self.rescans
    }

    /// Refresh `status` in place: session list (re-parsed only when the
    /// source changed), idle seconds, and load averages. Boot time is
    /// left untouched.
    pub fn collect(&mut self, status: &mut HostStatus, now: u32) {
        self.refresh_sessions(&mut status.sessions);
        self.refresh_idle(&mut status.sessions, now);
        status.load_avg = load_averages();
    }

    fn refresh_sessions(&mut self, sessions: &mut Vec<SessionEntry>) {
        let meta = match fs::metadata(&self.source) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    source = %self.source.display(),
                    error = %e,
                    "Cannot stat session source, keeping cached sessions"
                );
                return;
            }
        };
        let mtime = match meta.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(source = %self.source.display(), error = %e, "Session source has no mtime");
                return;
            }
        };

        let stamp = (mtime, meta.len());
        if self.cache_stamp == Some(stamp) {
            return;
        }

        let raw = match fs::read(&self.source) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(
                    source = %self.source.display(),
                    error = %e,
                    "Cannot read session source, keeping cached sessions"
                );
                return;
            }
        };

        *sessions = parse_utmp(&raw);
        // Stamp only after a successful parse so a failed pass is retried.
        self.cache_stamp = Some(stamp);
        self.rescans += 1;
        tracing::debug!(sessions = sessions.len(), "Session source re-parsed");
    }

    /// Idle = now minus the atime of the session's terminal device. A
    /// device that cannot be stat'ed keeps the idle value it already had.
    fn refresh_idle(&self, sessions: &mut [SessionEntry], now: u32) {
        for entry in sessions {
            let device = self.device_dir.join(&entry.line);
            if let Ok(atime) = fs::metadata(&device).and_then(|m| m.accessed()) {
                let atime_secs = atime
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |since| since.as_secs());
                entry.idle_secs = u64::from(now).saturating_sub(atime_secs) as u32;
            }
        }
    }
}

/// 1/5/15-minute load averages, ×100, truncated to integers.
fn load_averages() -> [u32; 3] {
    let load = System::load_average();
    [
        (load.one * 100.0) as u32,
        (load.five * 100.0) as u32,
        (load.fifteen * 100.0) as u32,
    ]
}

/// Pull live sessions out of a raw utmp image: USER_PROCESS records with
/// a non-empty user name, fields cut to wire width, capped at the packet
/// bound. Ragged trailing bytes are ignored.
fn parse_utmp(raw: &[u8]) -> Vec<SessionEntry> {
    let mut sessions = Vec::new();
    for record in raw.chunks_exact(UTMP_RECORD_LEN) {
        if sessions.len() == MAX_SESSIONS {
            break;
        }
        let ut_type = i16::from_ne_bytes([record[0], record[1]]);
        if ut_type != USER_PROCESS {
            continue;
        }
        let user = field_str(
            &record[UT_USER_OFFSET..UT_USER_OFFSET + UT_USER_LEN],
            SESSION_USER_LEN,
        );
        if user.is_empty() {
            continue;
        }
        let line = field_str(
            &record[UT_LINE_OFFSET..UT_LINE_OFFSET + UT_LINE_LEN],
            SESSION_LINE_LEN,
        );
        sessions.push(SessionEntry {
            line,
            user,
            idle_secs: 0,
        });
    }
    sessions
}

/// NUL-terminated fixed-width field, truncated to `max` bytes.
fn field_str(field: &[u8], max: usize) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end.min(max)]).into_owned()
}
