//! Peer status spool.
//!
//! One file per remote host, holding the last status frame received from
//! it. Files are never deleted here; a host that goes quiet simply stops
//! being rewritten and readers judge freshness by the embedded receive
//! time.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use argus_common::constants::SPOOL_PREFIX;

/// Permission bits every status file must carry.
const ALL_READ: u32 = 0o444;

/// Why a status frame could not be stored.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The hostname would resolve outside the spool directory.
    #[error("hostname {0:?} contains a path separator")]
    Name(String),

    /// The status file could not be opened, written, or re-moded.
    #[error("status file i/o failed: {0}")]
    Record(#[from] std::io::Error),
}

/// Write-side handle on the spool directory.
pub struct PeerStore {
    dir: PathBuf,
}

impl PeerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the spool directory if it does not exist yet.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Resolve the status file for `hostname`.
    ///
    /// The wire validator accepts any printable ASCII, which includes `/`;
    /// this is the boundary that keeps records inside the spool.
    fn spool_path(&self, hostname: &str) -> Result<PathBuf, StoreError> {
        if hostname.contains('/') {
            return Err(StoreError::Name(hostname.to_string()));
        }
        Ok(self.dir.join(format!("{SPOOL_PREFIX}{hostname}")))
    }

    /// Store the latest status frame for `hostname`, replacing any previous one.
    ///
    /// The frame lands at offset 0; when the previous file was longer it is
    /// truncated to the new length, so stale session entries from an earlier,
    /// larger packet never survive. The file always ends up world-readable.
    pub fn persist(&self, hostname: &str, frame: &[u8]) -> Result<(), StoreError> {
        let path = self.spool_path(hostname)?;

        let previous_len = match fs::metadata(&path) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::Record(e)),
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.write_all(frame)?;
        if previous_len.is_some_and(|len| len > frame.len() as u64) {
            file.set_len(frame.len() as u64)?;
        }

        let mut perms = file.metadata()?.permissions();
        if perms.mode() & ALL_READ != ALL_READ {
            perms.set_mode(perms.mode() | ALL_READ);
            file.set_permissions(perms)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_creates_prefixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path());

        store.persist("alpha", b"status frame").unwrap();

        let stored = fs::read(dir.path().join("argus.alpha")).unwrap();
        assert_eq!(stored, b"status frame");
    }

    #[test]
    fn test_shrinking_frame_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path());

        store.persist("alpha", &[0xAA; 200]).unwrap();
        store.persist("alpha", &[0xBB; 80]).unwrap();

        let stored = fs::read(dir.path().join("argus.alpha")).unwrap();
        assert_eq!(stored.len(), 80);
        assert_eq!(stored, vec![0xBB; 80]);
    }

    #[test]
    fn test_growing_frame_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path());

        store.persist("alpha", &[0xAA; 80]).unwrap();
        store.persist("alpha", &[0xBB; 200]).unwrap();

        let stored = fs::read(dir.path().join("argus.alpha")).unwrap();
        assert_eq!(stored, vec![0xBB; 200]);
    }

    #[test]
    fn test_persist_forces_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path());
        let path = dir.path().join("argus.alpha");

        store.persist("alpha", b"first").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        store.persist("alpha", b"second").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & ALL_READ, ALL_READ);
    }

    #[test]
    fn test_path_separator_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path());

        let err = store.persist("../escape", b"frame").unwrap_err();
        assert!(matches!(err, StoreError::Name(_)));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_ensure_dir_creates_missing_levels() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("spool/argus"));

        store.ensure_dir().unwrap();
        assert!(store.dir().is_dir());
    }
}
