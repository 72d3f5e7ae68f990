//! Cross-process lock around an update.
//!
//! Two launchers started at the same time would otherwise race on the same
//! executable and signature. The lock lives next to the executable as
//! `.<name>.lock` and is released when the guard is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock held for the duration of one update.
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Block until the lock for `executable_name` in `install_dir` is ours.
    ///
    /// Locking runs on the blocking pool, so a waiting launcher does not stall
    /// the runtime. There is no timeout.
    ///
    /// ```rust,no_run
    /// use signed_launcher::update::UpdateLock;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let lock = UpdateLock::acquire(Path::new("."), "tool-linux").await?;
    /// // update...
    /// drop(lock);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire(install_dir: &Path, executable_name: &str) -> Result<Self> {
        tokio::fs::create_dir_all(install_dir).await.with_context(|| {
            format!("Failed to create install directory {}", install_dir.display())
        })?;

        let path = install_dir.join(format!(".{executable_name}.lock"));
        let lock_path = path.clone();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire lock: {}", lock_path.display()))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::debug!(path = %path.display(), "Update lock acquired");
        Ok(Self {
            file,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
