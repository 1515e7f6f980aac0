use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{FileState, IngestFatal};

/// Moves source files out of the inbox once their batch has resolved.
#[derive(Debug, Clone)]
pub struct FileRouter {
    processed_dir: PathBuf,
    errored_dir: PathBuf,
}

impl FileRouter {
    pub fn new(processed_dir: impl Into<PathBuf>, errored_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            errored_dir: errored_dir.into(),
        }
    }

    /// Creates the `processed` and `errored` directories when they are absent.
    pub async fn ensure_layout(&self) -> Result<(), IngestFatal> {
        for dir in [&self.processed_dir, &self.errored_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| IngestFatal::Layout {
                    path: dir.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Where `path` sits in the file lifecycle, judged by its parent directory.
    pub fn state_of(&self, path: &Path) -> FileState {
        match path.parent() {
            Some(parent) if parent == self.processed_dir => FileState::Processed,
            Some(parent) if parent == self.errored_dir => FileState::Errored,
            _ => FileState::Pending,
        }
    }

    /// Relocates `path` keeping its file name and returns the destination.
    ///
    /// Must only run after the file's batch has committed or been discarded.
    pub async fn route(&self, path: &Path, succeeded: bool) -> Result<PathBuf, IngestFatal> {
        let (dir, state) = if succeeded {
            (&self.processed_dir, FileState::Processed)
        } else {
            (&self.errored_dir, FileState::Errored)
        };

        let relocate = |source: io::Error| IngestFatal::Relocate {
            from: path.to_path_buf(),
            to: dir.clone(),
            source,
        };

        let file_name = path.file_name().ok_or_else(|| {
            relocate(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let destination = dir.join(file_name);

        // A file reintroduced under the same name replaces the earlier copy.
        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            tokio::fs::remove_file(&destination)
                .await
                .map_err(relocate)?;
        }

        tokio::fs::rename(path, &destination)
            .await
            .map_err(relocate)?;
        debug!(file = %path.display(), ?state, destination = %destination.display(), "file routed");
        Ok(destination)
    }
}
