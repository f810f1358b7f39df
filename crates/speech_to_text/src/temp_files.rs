//! Scratch file management
//!
//! Uploads are persisted under unique names in a scratch directory. Removal
//! tolerates files that are briefly locked by another handle and never fails
//! the caller.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::types::AudioUpload;

/// Size of each write when persisting an upload
pub const WRITE_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of removal attempts for a locked file
pub const REMOVAL_ATTEMPTS: u32 = 3;

/// Deletes a single file from the filesystem
type RemoveFn = Arc<dyn Fn(&Path) -> std::io::Result<()> + Send + Sync>;

/// Persists uploads and reclaims scratch artifacts
#[derive(Clone)]
pub struct TempFileManager {
    scratch_dir: PathBuf,
    retry_delay: Duration,
    remover: RemoveFn,
}

impl fmt::Debug for TempFileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFileManager")
            .field("scratch_dir", &self.scratch_dir)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl TempFileManager {
    /// Create a manager rooted in `scratch_dir`
    #[must_use]
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            retry_delay: Duration::from_secs(1),
            remover: Arc::new(|path: &Path| std::fs::remove_file(path)),
        }
    }

    /// Create a manager from the speech configuration
    #[must_use]
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.scratch_dir())
            .with_retry_delay(Duration::from_millis(config.removal_retry_delay_ms))
    }

    /// Override the pause between removal attempts
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Replace the function that deletes files
    #[cfg(test)]
    pub(crate) fn with_remover(
        mut self,
        remover: impl Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.remover = Arc::new(remover);
        self
    }

    /// Directory holding scratch files
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Fresh `<uuid-v4>.<ext>` path inside the scratch directory
    #[must_use]
    pub fn scratch_path(&self, extension: &str) -> PathBuf {
        let name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{extension}", Uuid::new_v4())
        };
        self.scratch_dir.join(name)
    }

    /// Write the upload body to a new scratch file
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Storage` if the directory or file cannot be written.
    #[instrument(skip(self, upload), fields(size = upload.body().len()))]
    pub async fn persist(&self, upload: &AudioUpload, extension: &str) -> Result<PathBuf, SpeechError> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| storage_error("create scratch dir", &self.scratch_dir, &e))?;

        let path = self.scratch_path(extension);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| storage_error("create", &path, &e))?;

        for chunk in upload.body().chunks(WRITE_CHUNK_SIZE) {
            file.write_all(chunk)
                .await
                .map_err(|e| storage_error("write", &path, &e))?;
        }
        file.flush()
            .await
            .map_err(|e| storage_error("flush", &path, &e))?;

        debug!(path = %path.display(), "Upload persisted");
        Ok(path)
    }

    /// Remove a scratch file, retrying while it is locked
    ///
    /// A missing file is not an error. Failures are logged and swallowed.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn remove(&self, path: &Path) {
        for attempt in 1..=REMOVAL_ATTEMPTS {
            match self.remove_once(path).await {
                Ok(()) => {
                    debug!(attempt, "Scratch file removed");
                    return;
                },
                Err(e) if e.kind() == ErrorKind::NotFound => return,
                Err(e) if is_lock_error(&e) && attempt < REMOVAL_ATTEMPTS => {
                    debug!(attempt, error = %e, "Scratch file busy, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                },
                Err(e) => {
                    warn!(attempt, error = %e, "Could not remove scratch file");
                    return;
                },
            }
        }
    }

    async fn remove_once(&self, path: &Path) -> std::io::Result<()> {
        let remover = Arc::clone(&self.remover);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || remover(&path))
            .await
            .map_err(std::io::Error::other)?
    }

    /// Blocking variant of [`Self::remove`] without retries
    fn remove_now(&self, path: &Path) {
        match (self.remover)(path) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove scratch file"),
        }
    }
}

fn is_lock_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::PermissionDenied | ErrorKind::ResourceBusy
    )
}

fn storage_error(action: &str, path: &Path, err: &std::io::Error) -> SpeechError {
    SpeechError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

/// A converted intermediate that must not outlive the request
///
/// Call [`ConvertedArtifact::release`] on every exit path. If the guard is
/// dropped without being released the file is removed in the background.
#[derive(Debug)]
pub struct ConvertedArtifact {
    path: PathBuf,
    files: TempFileManager,
    released: bool,
}

impl ConvertedArtifact {
    /// Take ownership of a converted file
    #[must_use]
    pub const fn new(path: PathBuf, files: TempFileManager) -> Self {
        Self {
            path,
            files,
            released: false,
        }
    }

    /// Path of the artifact
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the artifact
    pub async fn release(mut self) {
        self.released = true;
        self.files.remove(&self.path).await;
    }

    /// Disarm the guard and hand the file over to the caller
    #[must_use]
    pub fn into_path(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ConvertedArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let files = self.files.clone();
                handle.spawn(async move { files.remove(&path).await });
            },
            Err(_) => self.files.remove_now(&path),
        }
    }
}
