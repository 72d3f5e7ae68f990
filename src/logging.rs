//! Process-wide logging for the launcher binary.
//!
//! Everything goes to stderr; when a log directory is configured, the same
//! events are appended to `launcher.log` there, without colour. The file is
//! rotated by size once per start, keeping `launcher.log.1` (newest) up to
//! `launcher.log.<max_files - 1>` (oldest).

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Name of the live log file inside the log directory.
pub const LOG_FILE: &str = "launcher.log";

/// Where and how much to keep on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub dir: PathBuf,
    /// Files kept, the live one included.
    pub max_files: usize,
    /// Size in bytes past which the live file is rotated.
    pub max_size: u64,
}

impl LogFile {
    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`. Fails if the log file cannot be prepared or
/// a subscriber is already installed; in the first case nothing is installed
/// and the caller may retry without a file.
pub fn init_logging(level: &str, file: Option<&LogFile>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match file {
        Some(file) => {
            let writer = open_log(file)?;
            Some(fmt::layer().with_writer(Mutex::new(writer)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")
}

fn open_log(file: &LogFile) -> Result<File> {
    fs::create_dir_all(&file.dir)
        .with_context(|| format!("Failed to create log directory {}", file.dir.display()))?;
    rotate(&file.dir, file.max_files, file.max_size)
        .with_context(|| format!("Failed to rotate logs in {}", file.dir.display()))?;

    let path = file.path();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Shift `launcher.log` into numbered backups once it exceeds `max_size`.
fn rotate(dir: &Path, max_files: usize, max_size: u64) -> io::Result<()> {
    let live = dir.join(LOG_FILE);
    let size = match fs::metadata(&live) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size <= max_size {
        return Ok(());
    }

    let backup = |n: usize| dir.join(format!("{LOG_FILE}.{n}"));
    let backups = max_files.saturating_sub(1);
    if backups == 0 {
        return fs::remove_file(&live);
    }

    remove_if_present(&backup(backups))?;
    for n in (1..backups).rev() {
        let from = backup(n);
        if from.exists() {
            fs::rename(&from, backup(n + 1))?;
        }
    }
    fs::rename(&live, backup(1))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
