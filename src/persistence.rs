use camino::Utf8Path;
use camino::Utf8PathBuf;

use crate::store::Snapshot;

/// JSON file holding the last accepted assignments and the enabled flag.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: Utf8PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Write the snapshot next to the target first and rename it into place,
    /// so a crash mid-write leaves the previous file intact.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(PersistenceError::Serializing)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        tracing::debug!(path = %self.path, "Saved display state");
        Ok(())
    }

    pub async fn load(&self) -> Result<Snapshot, PersistenceError> {
        let json = tokio::fs::read(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        serde_json::from_slice(&json).map_err(|source| PersistenceError::Parsing {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to access state file '{}'", .path)]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file '{}' is not valid", .path)]
    Parsing {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize display state")]
    Serializing(#[source] serde_json::Error),
}
