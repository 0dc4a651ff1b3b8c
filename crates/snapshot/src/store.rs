//! Append-only snapshot files.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
};

use alloy::primitives::{B256, keccak256};
use shuttle_primitives::Snapshot;
use tracing::info;

use crate::SnapshotError;

/// A snapshot read back from disk together with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSnapshot {
    /// The decoded snapshot.
    pub snapshot: Snapshot,
    /// keccak256 of the file bytes.
    pub digest: B256,
}

/// Identity of a snapshot file for resume purposes.
pub fn digest(bytes: &[u8]) -> B256 {
    keccak256(bytes)
}

/// Writes `snapshot` to a new file at `path` and returns its digest.
///
/// Never overwrites: an existing file is an error.
pub fn write_new(path: &Path, snapshot: &Snapshot) -> Result<B256, SnapshotError> {
    let bytes = snapshot.to_json_vec()?;
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SnapshotError::AlreadyExists { path: path.to_path_buf() });
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(&bytes)?;
    file.sync_all()?;

    let digest = digest(&bytes);
    info!(path = %path.display(), %digest, bytes = bytes.len(), "Wrote snapshot");
    Ok(digest)
}

/// Reads and decodes the snapshot at `path`.
pub fn load(path: &Path) -> Result<LoadedSnapshot, SnapshotError> {
    let bytes = fs::read(path)?;
    let snapshot = Snapshot::from_json_slice(&bytes)?;
    Ok(LoadedSnapshot { snapshot, digest: digest(&bytes) })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::empty("store", 42, 1);
        snapshot.epoch_rewards = vec![U256::from(7u64)];
        snapshot.epoch_to_total_staked_weight = vec![U256::from(3u64)];
        snapshot.per_epoch_staked_weight.insert(Address::repeat_byte(1), vec![U256::MAX]);
        snapshot
    }

    #[test]
    fn write_then_load_keeps_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let written = write_new(&path, &snapshot()).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.snapshot, snapshot());
        assert_eq!(loaded.digest, written);
        assert_eq!(written, digest(&fs::read(&path).unwrap()));
    }

    #[test]
    fn existing_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, b"keep me").unwrap();

        let err = write_new(&path, &snapshot()).unwrap_err();
        assert!(matches!(err, SnapshotError::AlreadyExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, b"{\"formatVersion\": 1").unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Format(_))));
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(&dir.path().join("nope.json")), Err(SnapshotError::Io(_))));
    }
}
