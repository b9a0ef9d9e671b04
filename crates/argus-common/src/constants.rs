//! Shared constants for Argus components.

/// Well-known service name for the status-exchange port
pub const STATUS_SERVICE: &str = "who";

/// Protocol the status service runs over
pub const STATUS_PROTO: &str = "udp";

/// Seconds between status broadcasts
pub const BROADCAST_INTERVAL_SECS: u64 = 3 * 60;

/// Boot time is re-read from the OS once every this many broadcast ticks
pub const BOOT_REFRESH_TICKS: u64 = 10;

/// Readers treat a host as down once its last report is older than this.
/// Must stay comfortably above BROADCAST_INTERVAL_SECS so a couple of lost
/// datagrams don't mark a live host down.
pub const DOWN_AFTER_SECS: u32 = 11 * 60;

/// Idle threshold for counting a session as an active user (roster)
pub const ACTIVE_IDLE_SECS: u32 = 60 * 60;

/// Spool file name prefix; one `argus.<hostname>` file per remote host
pub const SPOOL_PREFIX: &str = "argus.";

/// Default spool directory
pub const DEFAULT_SPOOL_DIR: &str = "/var/spool/argus";

/// Default login-session source
pub const DEFAULT_SESSION_SOURCE: &str = "/var/run/utmp";

/// Default directory holding terminal devices
pub const DEFAULT_DEVICE_DIR: &str = "/dev";
