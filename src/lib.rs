//! signed-launcher - a self-updating launcher for signed release builds.
//!
//! Before running an executable, the launcher asks a release feed (GitHub's
//! `releases/latest` JSON, or anything shaped like it) whether a newer build
//! exists. A newer build is recognised by its detached signature differing
//! from the one stored next to the local copy. The new build is downloaded,
//! checked against a minisign public key fetched from an independently
//! configured URL, and only then written to disk and run.
//!
//! # Architecture
//!
//! - [`update`] - the update pipeline: fetcher, local store, release
//!   resolution, signature comparison, verification and the task graph that
//!   ties them together
//! - [`config`] - `launcher.toml` loading and executable selection
//! - [`cli`] - argument parsing and the end-to-end run
//! - [`launch`] - running the installed executable
//! - [`logging`] - stderr and rotating file logs
//! - [`core`] - user-facing error reporting
//!
//! # Library use
//!
//! ```rust,no_run
//! use signed_launcher::update::{HttpFetcher, UpdateOutcome, UpdateTargets, Updater};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = HttpFetcher::new("my-tool-launcher/1.0", None)?;
//! let targets = UpdateTargets::new(
//!     "https://api.github.com/repos/acme/tool/releases/latest",
//!     "https://keys.acme.example/tool.pub",
//!     Path::new("."),
//!     "tool-linux",
//! );
//!
//! match Updater::new(fetcher).run(&targets).await {
//!     UpdateOutcome::Updated(report) => println!("installed build signed by {}", report.signer),
//!     UpdateOutcome::Skipped { .. } => println!("already up to date"),
//!     UpdateOutcome::Failed { node, error } => eprintln!("{node}: {error}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod launch;
pub mod logging;
pub mod update;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
