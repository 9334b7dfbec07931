//! Local JSON persistence for cardpick.
//!
//! The location mapping, the image index, and progress snapshots are each a
//! single JSON document owned by exactly one writer. [`JsonFile`] is the handle
//! those owners hold:
//! - a missing file loads as the type's default
//! - a malformed file is logged and loads as the default
//! - saves are atomic (write to temp, then rename)

use std::path::{Path, PathBuf};

use cardpick_shared::{CardpickError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Handle to one persisted JSON document.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document, falling back to `T::default()` when it is missing or unreadable.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> T {
        match self.load::<T>() {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(path = %self.path.display(), "file not found, starting empty");
                T::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable file");
                T::default()
            }
        }
    }

    /// Load the document. `Ok(None)` when the file does not exist.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CardpickError::io(&self.path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CardpickError::parse(format!("{}: {e}", self.path.display())))
    }

    /// Atomically replace the document with `data`, pretty-printed.
    pub fn save<T: Serialize>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| CardpickError::Storage(format!("JSON serialization failed: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CardpickError::io(parent, e))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CardpickError::Storage(format!("not a file path: {}", self.path.display()))
            })?;
        let temp = self.path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, json).map_err(|e| CardpickError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| CardpickError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "saved");
        Ok(())
    }
}
