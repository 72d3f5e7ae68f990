//! Command-line interface.
//!
//! ```text
//! signed-launcher [OPTIONS] [OVERRIDE] [ARGS]...
//! ```
//!
//! `OVERRIDE` is an optional first argument `exe=<file>` or `os=<platform>`
//! choosing which executable to update and run. Everything after it goes to
//! the launched process untouched, including arguments that look like flags.
//!
//! # Examples
//!
//! ```bash
//! signed-launcher                      # default executable
//! signed-launcher os=linux --port 80   # platform executable, "--port 80" forwarded
//! signed-launcher exe=tool-beta        # explicit file name
//! signed-launcher --no-launch          # update only
//! signed-launcher -v -c /etc/tool/launcher.toml
//! ```
//!
//! Exit status: non-zero for configuration errors (before any network access)
//! and for update failures (nothing is launched); otherwise the child's exit
//! code, or 0 with `--no-launch`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::config::{LauncherConfig, Selection};
use crate::core::error::LauncherError;
use crate::launch::launch;
use crate::logging::{LogFile, init_logging};
use crate::update::{HttpFetcher, UpdateLock, UpdateOutcome, UpdateTargets, Updater};

/// Verifying self-updater and launcher.
#[derive(Parser, Debug)]
#[command(
    name = "signed-launcher",
    about = "Update an executable from signed releases, then run it",
    version,
    long_about = "Checks a release feed for a newer build of the configured executable, verifies \
its minisign signature against a trusted key, installs it atomically, and runs it."
)]
pub struct Cli {
    /// Configuration file (default: $SIGNED_LAUNCHER_CONFIG or ./launcher.toml).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long)]
    quiet: bool,

    /// Update, but do not run the executable.
    #[arg(long)]
    no_launch: bool,

    /// Optional `exe=<file>` / `os=<platform>` override, then arguments for
    /// the launched process.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    /// Log level from `--verbose` / `--quiet`; `RUST_LOG` still overrides it.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    pub fn no_launch(&self) -> bool {
        self.no_launch
    }

    /// Executable selection and the arguments to forward.
    ///
    /// Only the first argument may be an override. An `exe=` or `os=` token
    /// with an empty value is consumed and falls back to the default; any
    /// other first argument is forwarded like the rest.
    pub fn selection(&self) -> (Selection, &[String]) {
        let Some((first, rest)) = self.args.split_first() else {
            return (Selection::Default, &self.args);
        };

        match first.split_once('=') {
            Some(("exe", value)) => (non_empty(value).map_or(Selection::Default, Selection::Executable), rest),
            Some(("os", value)) => (non_empty(value).map_or(Selection::Default, Selection::Platform), rest),
            _ => (Selection::Default, &self.args),
        }
    }

    /// Run the launcher and return the process exit code.
    pub async fn execute(self) -> Result<i32> {
        let config_path = LauncherConfig::locate(self.config.as_deref());
        let config = LauncherConfig::load(&config_path).await.map_err(LauncherError::from)?;

        let (selection, forwarded) = self.selection();
        let executable = config.executable_for(&selection).map_err(LauncherError::from)?;

        let log_file = LogFile {
            dir: config.log_dir.clone(),
            max_files: config.max_log_files,
            max_size: config.max_log_size,
        };
        if let Err(e) = init_logging(self.log_level(), Some(&log_file)) {
            match init_logging(self.log_level(), None) {
                Ok(()) => warn!("File logging disabled: {e:#}"),
                Err(fallback) => eprintln!("Logging disabled: {e:#}; {fallback:#}"),
            }
        }

        info!("==================================================================================");
        info!(executable = %executable, ?selection, "Launcher started");

        let targets = UpdateTargets::new(
            &config.release_url,
            &config.public_key_url,
            &config.install_dir,
            &executable,
        );
        let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout())
            .context("Failed to build HTTP client")?;

        let outcome = {
            let _lock = UpdateLock::acquire(&config.install_dir, &executable).await?;
            Updater::new(fetcher).run(&targets).await
        };

        match outcome {
            UpdateOutcome::Failed {
                node,
                error,
            } => Err(LauncherError::Update {
                node,
                source: error,
            }
            .into()),
            UpdateOutcome::Updated(_) | UpdateOutcome::Skipped {
                ..
            } if self.no_launch => {
                info!("Update complete, not launching (--no-launch)");
                Ok(0)
            }
            UpdateOutcome::Updated(_) | UpdateOutcome::Skipped {
                ..
            } => Ok(launch(&targets.executable, forwarded).await?),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
