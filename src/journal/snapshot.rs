//! Snapshot files (spec.md §4.4 "Snapshots", §6 "Persisted state layout").
//!
//! A `SNAPSHOT` journal event marks a consistent checkpoint; its body
//! references an external file by path and content hash. The file itself
//! holds a JSON dump of positions, accounts, and open orders, read back via
//! `memmap2` the way the teacher's `Sentinel` maps its WAL
//! (`nexus_core::persistence::mod.rs`) rather than a buffered read, since
//! snapshot files can be large and are read once in full at startup.

use crate::order::Order;
use crate::position::{Account, Position};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    pub sequence: u64,
    /// Human-readable checkpoint time; the journal's own `timestamp_ns` on
    /// the `SNAPSHOT` record, not this field, is what recovery orders by.
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub positions: Vec<Position>,
    pub accounts: Vec<Account>,
    /// `(symbol, order)` pairs for every resting order across all books.
    pub open_orders: Vec<(String, Order)>,
}

/// Writes `data` as JSON to `path` and returns `(path, content_hash)` for
/// the `SNAPSHOT` event body. The hash reuses the journal's own checksum
/// (spec.md §9 leaves the digest algorithm unspecified; consistency with
/// the record checksum keeps the codebase to one checksum primitive).
pub fn write_snapshot(path: impl AsRef<Path>, data: &SnapshotData) -> io::Result<String> {
    let bytes = serde_json::to_vec(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(format!("{:08x}", super::checksum::compute(&bytes)))
}

pub fn read_snapshot(path: impl AsRef<Path>) -> io::Result<SnapshotData> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    serde_json::from_slice(&mmap).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Verifies a previously-written snapshot file's bytes still hash to
/// `expected_hash`, used by the recovery driver before trusting it.
pub fn verify_snapshot(path: impl AsRef<Path>, expected_hash: &str) -> io::Result<bool> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(format!("{:08x}", super::checksum::compute(&mmap)) == expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot-10.bin");
        let data = SnapshotData { sequence: 10, created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(), positions: vec![], accounts: vec![], open_orders: vec![] };
        let hash = write_snapshot(&path, &data).unwrap();
        assert!(verify_snapshot(&path, &hash).unwrap());
        let read_back = read_snapshot(&path).unwrap();
        assert_eq!(read_back.sequence, 10);
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot-1.bin");
        let data = SnapshotData { sequence: 1, created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(), positions: vec![], accounts: vec![], open_orders: vec![] };
        let hash = write_snapshot(&path, &data).unwrap();
        std::fs::write(&path, b"{\"sequence\":999,\"created_at\":\"1970-01-01T00:00:00Z\",\"positions\":[],\"accounts\":[],\"open_orders\":[]}").unwrap();
        assert!(!verify_snapshot(&path, &hash).unwrap());
    }
}
