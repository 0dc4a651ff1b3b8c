//! Exclusive run lock.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::ProgressError;

/// An exclusively created `<progress>.lock` file, removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Lock file path guarding `progress_path`.
    pub fn path_for(progress_path: &Path) -> PathBuf {
        let mut name = OsString::from(progress_path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Takes the lock guarding `progress_path`.
    pub fn acquire(progress_path: &Path) -> Result<Self, ProgressError> {
        let path = Self::path_for(progress_path);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ProgressError::Locked { path });
            }
            Err(e) => return Err(ProgressError::Io(e)),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove run lock");
        }
    }
}
