//! Persistence seam for the settings document.
//!
//! The controller calls [`SettingsStore::save`] after every mutation of the
//! access list, the rule list or the settings, always with the complete
//! document. [`JsonFileStore`] keeps it in a single JSON file;
//! [`MemoryStore`] keeps it in memory for tests and the simulator.

use crate::{
    error::{StorageError, StorageResult},
    settings::SettingsDocument,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, info, warn};

/// Load/save interface for the settings document.
pub trait SettingsStore: Send {
    /// Read the stored document. `Ok(None)` means nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    fn load(&self) -> StorageResult<Option<SettingsDocument>>;

    /// Replace the stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document could not be written.
    fn save(&mut self, document: &SettingsDocument) -> StorageResult<()>;

    /// Remove the stored document (factory reset).
    ///
    /// # Errors
    ///
    /// Returns an error if an existing document could not be removed.
    fn clear(&mut self) -> StorageResult<()>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for Box<T> {
    fn load(&self) -> StorageResult<Option<SettingsDocument>> {
        (**self).load()
    }

    fn save(&mut self, document: &SettingsDocument) -> StorageResult<()> {
        (**self).save(document)
    }

    fn clear(&mut self) -> StorageResult<()> {
        (**self).clear()
    }
}

/// Load the stored document, falling back to defaults.
///
/// A missing document silently yields defaults; an unreadable or corrupt one
/// is logged and also yields defaults. Startup never fails on persistence.
pub fn load_or_default(store: &dyn SettingsStore) -> SettingsDocument {
    match store.load() {
        Ok(Some(document)) => {
            info!(
                users = document.access.len(),
                rules = document.rules.len(),
                "Settings loaded"
            );
            document
        }
        Ok(None) => {
            info!("No stored settings, using defaults");
            SettingsDocument::default()
        }
        Err(e) => {
            warn!(error = %e, "Stored settings unusable, using defaults");
            SettingsDocument::default()
        }
    }
}

/// Settings document kept in a JSON file.
///
/// Saves go through a sibling temporary file and a rename, so a crash while
/// writing leaves either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "settings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> StorageResult<Option<SettingsDocument>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        SettingsDocument::from_json(&text).map(Some)
    }

    fn save(&mut self, document: &SettingsDocument) -> StorageResult<()> {
        let json = document.to_json()?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Settings removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<SettingsDocument>,
    saves: usize,
    fail_saves: bool,
}

/// In-memory settings store.
///
/// Clones share the same state, so a test can keep one clone to inspect what
/// the controller saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `document`.
    pub fn with_document(document: SettingsDocument) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.document = Some(document);
        }
        store
    }

    /// Last saved document.
    pub fn document(&self) -> Option<SettingsDocument> {
        self.state.lock().ok().and_then(|s| s.document.clone())
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.saves).unwrap_or_default()
    }

    /// Make subsequent saves fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_saves = failing;
        }
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("memory store lock poisoned".to_string()))
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> StorageResult<Option<SettingsDocument>> {
        Ok(self.lock()?.document.clone())
    }

    fn save(&mut self, document: &SettingsDocument) -> StorageResult<()> {
        let mut state = self.lock()?;
        if state.fail_saves {
            return Err(StorageError::Io(io::Error::other("simulated save failure")));
        }
        state.document = Some(document.clone());
        state.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.lock()?.document = None;
        Ok(())
    }
}
