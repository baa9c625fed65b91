//! Store persistence with file locking.
//!
//! The whole [`WaterState`] is written as one JSON document after every
//! mutation. [`JsonFileStorage`] is the on-disk backend; [`MemoryStorage`]
//! keeps the serialized document in memory.

use crate::types::SCHEMA_VERSION;
use crate::{Error, Result, WaterState};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// File name of the persisted store inside the data directory
pub const STATE_FILE_NAME: &str = "state.json";

/// Durable home for the store document
pub trait StateStorage: Send {
    /// Read the last saved state. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> Result<Option<WaterState>>;

    /// Replace the saved state
    fn save(&mut self, state: &WaterState) -> Result<()>;
}

fn parse_state(contents: &str) -> Result<WaterState> {
    let state: WaterState = serde_json::from_str(contents)?;
    if state.version > SCHEMA_VERSION {
        return Err(Error::State(format!(
            "state schema version {} is newer than supported version {}",
            state.version, SCHEMA_VERSION
        )));
    }
    Ok(state)
}

/// JSON document on disk
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `<data_dir>/state.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable state file is moved before defaults take over
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn read_locked(&self) -> Result<String> {
        let file = File::open(&self.path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read = reader.read_to_string(&mut contents);
        file.unlock()?;
        read?;

        Ok(contents)
    }

    /// Read and parse without quarantining on failure
    ///
    /// For repeated background reads, where a bad file has already been
    /// reported and backed up once.
    pub fn peek(&self) -> Result<Option<WaterState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = self.read_locked()?;
        parse_state(&contents).map(Some)
    }

    fn quarantine(&self) {
        let target = self.quarantine_path();
        match std::fs::copy(&self.path, &target) {
            Ok(_) => tracing::warn!("Copied unreadable state file to {:?}", target),
            Err(e) => tracing::warn!("Unable to back up state file to {:?}: {}", target, e),
        }
    }
}

impl StateStorage for JsonFileStorage {
    /// Load with a shared lock
    ///
    /// A missing file is `Ok(None)`. An unreadable or unparsable file is
    /// copied to [`JsonFileStorage::quarantine_path`] and reported as an error.
    fn load(&self) -> Result<Option<WaterState>> {
        match self.peek() {
            Ok(None) => {
                tracing::info!("No state file at {:?}", self.path);
                Ok(None)
            }
            Ok(Some(state)) => {
                tracing::debug!("Loaded state from {:?}", self.path);
                Ok(Some(state))
            }
            Err(e) => {
                tracing::warn!("Failed to load state file {:?}: {}", self.path, e);
                self.quarantine();
                Err(e)
            }
        }
    }

    /// Save with an exclusive lock
    ///
    /// Atomically writes state by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn save(&mut self, state: &WaterState) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "state path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        // Create unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(parent)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(state)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved state to {:?}", self.path);
        Ok(())
    }
}

/// In-memory backend; clones share one document
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    document: Option<String>,
    fail_writes: bool,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with a raw document, e.g. to simulate a corrupted store
    pub fn with_document(document: impl Into<String>) -> Self {
        let storage = Self::default();
        storage.lock().document = Some(document.into());
        storage
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every following save fail with an IO error
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    pub fn document(&self) -> Option<String> {
        self.lock().document.clone()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<WaterState>> {
        match self.document() {
            Some(contents) => parse_state(&contents).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &WaterState) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "storage is read-only",
            )));
        }
        inner.document = Some(serde_json::to_string(state)?);
        inner.saves += 1;
        Ok(())
    }
}
