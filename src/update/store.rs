use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, trace};

use super::error::{Result, UpdateError};

/// Local filesystem access for the executable and its sidecar signature.
///
/// Reads treat a missing file as "nothing stored yet" and return the caller's
/// default. Writes go through a temporary file in the same directory followed
/// by a rename, so the target is either the old content or the new content,
/// never a partial write.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    /// Read `path` as text, or return `default` when it does not exist.
    pub async fn read(&self, path: &Path, default: &str) -> Result<String> {
        debug!(path = %path.display(), "Read file");

        // Undecodable bytes become U+FFFD, so a corrupt file reads as a
        // differing value rather than an error.
        match fs::read(path).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                trace!(content = %content, "Read file content");
                Ok(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "File absent, using default");
                Ok(default.to_string())
            }
            Err(source) => Err(UpdateError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Replace the content of `path` with `content`.
    pub async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.persist(path, content.to_vec(), false).await
    }

    /// Like [`write`](Self::write), but marks the result executable on Unix.
    pub async fn write_executable(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.persist(path, content.to_vec(), true).await
    }

    async fn persist(&self, path: &Path, content: Vec<u8>, executable: bool) -> Result<()> {
        debug!(path = %path.display(), bytes = content.len(), "Write file");

        let target = path.to_path_buf();
        let persist_error = |source| UpdateError::Persist {
            path: path.to_path_buf(),
            source,
        };

        tokio::task::spawn_blocking(move || replace_file(&target, &content, executable))
            .await
            .map_err(|e| persist_error(std::io::Error::other(e)))?
            .map_err(persist_error)
    }
}

/// Write `content` next to `target` and rename it into place.
fn replace_file(target: &Path, content: &[u8], executable: bool) -> std::io::Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp.as_file().metadata()?.permissions();
        perms.set_mode(0o755);
        temp.as_file().set_permissions(perms)?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
