//! State snapshots and their JSON persistence.
//!
//! A [`StateSnapshot`] is a plain copy of the store's two tiers. It can be
//! written to disk and read back, for example to restore a half-filled form
//! after a restart.
//!
//! Writes are atomic: the JSON goes to a sibling temporary file first, which
//! is then renamed over the target, so a crash mid-write never leaves a
//! truncated snapshot behind.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "global": { "user": { "name": "ada" } },
//!   "components": { "email_field": "ada@example.com" }
//! }
//! ```

use crate::domain::{DynUiError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

const FORMAT_VERSION: u32 = 1;

/// Copy of global and component state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Global state.
    #[serde(default)]
    pub global: Map<String, Value>,

    /// Component states keyed by node id.
    #[serde(default)]
    pub components: Map<String, Value>,
}

#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    version: u32,
    #[serde(flatten)]
    snapshot: &'a StateSnapshot,
}

#[derive(Deserialize)]
struct SnapshotFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(flatten)]
    snapshot: StateSnapshot,
}

const fn default_version() -> u32 {
    FORMAT_VERSION
}

impl StateSnapshot {
    /// Writes the snapshot to `path` atomically, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// temporary file cannot be written or renamed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dynui::state::StateSnapshot;
    ///
    /// StateSnapshot::default().save("/tmp/dynui/state.json")?;
    /// # Ok::<(), dynui::DynUiError>(())
    /// ```
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, components = self.components.len(), "saving state snapshot");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = SnapshotFileRef {
            version: FORMAT_VERSION,
            snapshot: self,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| DynUiError::Storage(format!("failed to serialize snapshot: {e}")))?;

        let tmp_path = path.with_extension("tmp");
        tracing::trace!(tmp_path = ?tmp_path, "writing to temporary file");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        tracing::debug!("state snapshot saved");
        Ok(())
    }

    /// Reads a snapshot previously written by [`StateSnapshot::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or was
    /// written by a newer format version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let file: SnapshotFile = serde_json::from_str(&contents)
            .map_err(|e| DynUiError::Storage(format!("failed to parse snapshot: {e}")))?;

        if file.version > FORMAT_VERSION {
            return Err(DynUiError::Storage(format!(
                "snapshot version {} is newer than supported version {FORMAT_VERSION}",
                file.version
            )));
        }

        tracing::debug!(
            path = ?path,
            version = file.version,
            components = file.snapshot.components.len(),
            "loaded state snapshot"
        );
        Ok(file.snapshot)
    }
}
