//! Status packet wire format.
//!
//! One datagram carries one host's snapshot: a fixed 58-byte header followed
//! by zero or more fixed-size session entries. All multi-byte integers are
//! big-endian regardless of host order, and every field is read and written
//! explicitly; the in-memory structs are never aliased onto the wire.
//!
//! ```text
//! hostname      32 bytes, NUL-padded
//! boot time      4 bytes, epoch seconds
//! send time      4 bytes, stamped by the sender
//! recv time      4 bytes, zero on the wire, stamped by the receiver
//! load avg ×3   12 bytes, ×100 scaled
//! version        1 byte
//! type           1 byte
//! entries       20 bytes each: line[8], user[8], idle seconds u32
//! ```
//!
//! The entry count is never transmitted; it is `(len - 58) / 20`, and ragged
//! trailing bytes are ignored.

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Supported protocol version
pub const WIRE_VERSION: u8 = 1;

/// Type tag of a status packet (the only type currently defined)
pub const PACKET_TYPE_STATUS: u8 = 1;

/// Width of the hostname field
pub const HOSTNAME_LEN: usize = 32;

/// Width of a session entry's terminal-line field
pub const SESSION_LINE_LEN: usize = 8;

/// Width of a session entry's user-name field
pub const SESSION_USER_LEN: usize = 8;

/// Encoded size of one session entry
pub const SESSION_ENTRY_LEN: usize = SESSION_LINE_LEN + SESSION_USER_LEN + 4;

/// Encoded size of the fixed header
pub const HEADER_LEN: usize = HOSTNAME_LEN + 4 + 4 + 4 + 3 * 4 + 1 + 1;

/// Most session entries one packet may carry (1024-byte entry area)
pub const MAX_SESSIONS: usize = 1024 / SESSION_ENTRY_LEN;

/// Largest frame the protocol produces
pub const MAX_PACKET: usize = HEADER_LEN + MAX_SESSIONS * SESSION_ENTRY_LEN;

const VERSION_OFFSET: usize = HEADER_LEN - 2;
const TYPE_OFFSET: usize = HEADER_LEN - 1;

/// One active login session on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Terminal line, e.g. `pts/3` (at most [`SESSION_LINE_LEN`] bytes)
    pub line: String,

    /// Login name (at most [`SESSION_USER_LEN`] bytes)
    pub user: String,

    /// Seconds since the terminal was last touched
    pub idle_secs: u32,
}

/// One host's self-reported snapshot: identity, uptime, load, sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    /// Sender's short hostname
    pub hostname: String,

    /// When the sender booted (epoch seconds)
    pub boot_time: u32,

    /// When the sender built this packet (epoch seconds)
    pub send_time: u32,

    /// When the packet was received; zero until the receiving host stamps it
    pub recv_time: u32,

    /// 1/5/15-minute load averages, ×100
    pub load_avg: [u32; 3],

    /// Active sessions in discovery order
    pub sessions: Vec<SessionEntry>,
}

impl HostStatus {
    /// Fresh snapshot for this host; load and sessions are filled per tick
    pub fn new(hostname: impl Into<String>, boot_time: u32) -> Self {
        Self {
            hostname: hostname.into(),
            boot_time,
            send_time: 0,
            recv_time: 0,
            load_avg: [0; 3],
            sessions: Vec::new(),
        }
    }

    /// Seconds the host had been up when it sent this snapshot
    pub fn uptime_secs(&self) -> u32 {
        self.send_time.saturating_sub(self.boot_time)
    }

    /// Serialize to one datagram. The session list is truncated to
    /// [`MAX_SESSIONS`], keeping the earliest-discovered entries, so the
    /// frame never exceeds [`MAX_PACKET`].
    pub fn encode(&self) -> Vec<u8> {
        let count = self.sessions.len().min(MAX_SESSIONS);
        let mut buf = Vec::with_capacity(HEADER_LEN + count * SESSION_ENTRY_LEN);

        push_padded(&mut buf, self.hostname.as_bytes(), HOSTNAME_LEN);
        buf.extend_from_slice(&self.boot_time.to_be_bytes());
        buf.extend_from_slice(&self.send_time.to_be_bytes());
        buf.extend_from_slice(&self.recv_time.to_be_bytes());
        for load in &self.load_avg {
            buf.extend_from_slice(&load.to_be_bytes());
        }
        buf.push(WIRE_VERSION);
        buf.push(PACKET_TYPE_STATUS);

        for entry in &self.sessions[..count] {
            push_padded(&mut buf, entry.line.as_bytes(), SESSION_LINE_LEN);
            push_padded(&mut buf, entry.user.as_bytes(), SESSION_USER_LEN);
            buf.extend_from_slice(&entry.idle_secs.to_be_bytes());
        }
        buf
    }

    /// Parse one datagram.
    ///
    /// Rejects frames shorter than the header, frames with an unsupported
    /// version tag, and frames that are not status packets, each as its own
    /// [`WireError`] variant carrying the offending value. Entries beyond
    /// [`MAX_SESSIONS`] are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated { len: buf.len() });
        }
        let version = buf[VERSION_OFFSET];
        if version != WIRE_VERSION {
            return Err(WireError::Version { found: version });
        }
        let kind = buf[TYPE_OFFSET];
        if kind != PACKET_TYPE_STATUS {
            return Err(WireError::Type { found: kind });
        }

        let hostname = field_str(&buf[..HOSTNAME_LEN]);
        let boot_time = read_u32(buf, HOSTNAME_LEN);
        let send_time = read_u32(buf, HOSTNAME_LEN + 4);
        let recv_time = read_u32(buf, HOSTNAME_LEN + 8);
        let load_avg = [
            read_u32(buf, HOSTNAME_LEN + 12),
            read_u32(buf, HOSTNAME_LEN + 16),
            read_u32(buf, HOSTNAME_LEN + 20),
        ];

        let count = ((buf.len() - HEADER_LEN) / SESSION_ENTRY_LEN).min(MAX_SESSIONS);
        let mut sessions = Vec::with_capacity(count);
        for i in 0..count {
            let at = HEADER_LEN + i * SESSION_ENTRY_LEN;
            sessions.push(SessionEntry {
                line: field_str(&buf[at..at + SESSION_LINE_LEN]),
                user: field_str(
                    &buf[at + SESSION_LINE_LEN..at + SESSION_LINE_LEN + SESSION_USER_LEN],
                ),
                idle_secs: read_u32(buf, at + SESSION_LINE_LEN + SESSION_USER_LEN),
            });
        }

        Ok(Self {
            hostname,
            boot_time,
            send_time,
            recv_time,
            load_avg,
            sessions,
        })
    }
}

/// Check a hostname before it is allowed to name a spool file: non-empty,
/// printable ASCII, no whitespace or control characters.
pub fn hostname_is_valid(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (0x21..=0x7e).contains(&b))
}

/// Write `bytes` truncated to `width`, NUL-padded to exactly `width`
fn push_padded(buf: &mut Vec<u8>, bytes: &[u8], width: usize) {
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (width - n), 0);
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// A fixed-width field holds the bytes up to the first NUL
fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_status() -> HostStatus {
        HostStatus {
            hostname: "ariel".to_string(),
            boot_time: 1_700_000_000,
            send_time: 1_700_086_400,
            recv_time: 0,
            load_avg: [152, 98, 45],
            sessions: vec![
                SessionEntry {
                    line: "console".to_string(),
                    user: "root".to_string(),
                    idle_secs: 12,
                },
                SessionEntry {
                    line: "pts/0".to_string(),
                    user: "mira".to_string(),
                    idle_secs: 0,
                },
            ],
        }
    }

    #[test]
    fn test_round_trip() {
        let status = sample_status();
        let frame = status.encode();
        assert_eq!(frame.len(), HEADER_LEN + 2 * SESSION_ENTRY_LEN);
        assert_eq!(HostStatus::decode(&frame).unwrap(), status);
    }

    #[test]
    fn test_round_trip_without_sessions() {
        let mut status = sample_status();
        status.sessions.clear();
        let frame = status.encode();
        assert_eq!(frame.len(), HEADER_LEN);
        assert_eq!(HostStatus::decode(&frame).unwrap(), status);
    }

    #[test]
    fn test_rejects_short_frame() {
        let frame = sample_status().encode();
        assert_eq!(
            HostStatus::decode(&frame[..HEADER_LEN - 1]),
            Err(WireError::Truncated { len: HEADER_LEN - 1 })
        );
    }

    #[test]
    fn test_rejects_wrong_version_and_keeps_it() {
        let mut frame = sample_status().encode();
        frame[HEADER_LEN - 2] = 9;
        assert_eq!(
            HostStatus::decode(&frame),
            Err(WireError::Version { found: 9 })
        );
    }

    #[test]
    fn test_rejects_wrong_type_and_keeps_it() {
        let mut frame = sample_status().encode();
        frame[HEADER_LEN - 1] = 3;
        assert_eq!(HostStatus::decode(&frame), Err(WireError::Type { found: 3 }));
    }

    #[test]
    fn test_encode_caps_sessions_keeping_earliest() {
        let mut status = sample_status();
        status.sessions = (0..MAX_SESSIONS + 10)
            .map(|i| SessionEntry {
                line: format!("pts/{i}"),
                user: format!("u{i}"),
                idle_secs: i as u32,
            })
            .collect();

        let frame = status.encode();
        assert_eq!(frame.len(), MAX_PACKET);

        let decoded = HostStatus::decode(&frame).unwrap();
        assert_eq!(decoded.sessions.len(), MAX_SESSIONS);
        assert_eq!(decoded.sessions[0].user, "u0");
        assert_eq!(decoded.sessions[MAX_SESSIONS - 1].user, format!("u{}", MAX_SESSIONS - 1));
    }

    #[test]
    fn test_ragged_tail_is_ignored() {
        let status = sample_status();
        let mut frame = status.encode();
        frame.extend_from_slice(&[0xAA; SESSION_ENTRY_LEN - 3]);
        assert_eq!(HostStatus::decode(&frame).unwrap(), status);
    }

    #[test]
    fn test_entry_count_inferred_from_length() {
        let status = sample_status();
        let frame = status.encode();
        // Dropping the last entry's bytes drops exactly one entry.
        let shorter = &frame[..frame.len() - SESSION_ENTRY_LEN];
        let decoded = HostStatus::decode(shorter).unwrap();
        assert_eq!(decoded.sessions.len(), 1);
        assert_eq!(decoded.sessions[0].user, "root");
    }

    #[test]
    fn test_field_truncation_on_encode() {
        let mut status = sample_status();
        status.hostname = "a-hostname-well-beyond-the-thirty-two-limit".to_string();
        status.sessions[0].user = "excessively-long".to_string();
        let decoded = HostStatus::decode(&status.encode()).unwrap();
        assert_eq!(decoded.hostname.len(), HOSTNAME_LEN);
        assert_eq!(decoded.sessions[0].user, "excessiv");
    }

    #[test]
    fn test_hostname_validation() {
        assert!(hostname_is_valid("ariel"));
        assert!(hostname_is_valid("node-7.lan"));
        assert!(hostname_is_valid("x"));

        assert!(!hostname_is_valid(""));
        assert!(!hostname_is_valid("two words"));
        assert!(!hostname_is_valid("tab\there"));
        assert!(!hostname_is_valid("ctrl\u{1}char"));
        assert!(!hostname_is_valid("high\u{e9}bit"));
    }

    #[test]
    fn test_uptime_never_underflows() {
        let mut status = sample_status();
        status.send_time = status.boot_time - 1;
        assert_eq!(status.uptime_secs(), 0);
    }
}
