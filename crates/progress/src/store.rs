//! Progress stores.

use std::{
    ffi::OsString,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{MigrationProgress, ProgressError};

/// Durable storage for a single stream's [`MigrationProgress`].
pub trait ProgressStore: Debug + Send + Sync {
    /// Loads stored progress. Returns `Ok(None)` if nothing was stored yet.
    fn load(&self) -> Result<Option<MigrationProgress>, ProgressError>;

    /// Replaces stored progress atomically.
    fn save(&self, progress: &MigrationProgress) -> Result<(), ProgressError>;
}

/// Progress stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the progress file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch file the next save is written to before it replaces the progress file.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Flushes the directory entry created by a rename.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl ProgressStore for FileProgressStore {
    fn load(&self) -> Result<Option<MigrationProgress>, ProgressError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProgressError::Io(e)),
        }
    }

    fn save(&self, progress: &MigrationProgress) -> Result<(), ProgressError> {
        let json = serde_json::to_vec_pretty(progress)?;

        // Write to temporary file in the same directory
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;

        // Atomically rename to final location
        fs::rename(&temp_path, &self.path)?;
        sync_parent(&self.path)?;

        Ok(())
    }
}

/// Progress held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    progress: Option<MigrationProgress>,
    saves: usize,
}

impl MemoryProgressStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `progress`.
    pub fn with_progress(progress: MigrationProgress) -> Self {
        let store = Self::default();
        store.lock().progress = Some(progress);
        store
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    /// Returns the stored progress.
    pub fn get(&self) -> Option<MigrationProgress> {
        self.lock().progress.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self) -> Result<Option<MigrationProgress>, ProgressError> {
        Ok(self.get())
    }

    fn save(&self, progress: &MigrationProgress) -> Result<(), ProgressError> {
        let mut inner = self.lock();
        inner.progress = Some(progress.clone());
        inner.saves += 1;
        Ok(())
    }
}
