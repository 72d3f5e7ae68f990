//! Verified self-update pipeline.
//!
//! One run of the [`Updater`] walks this dependency graph:
//!
//! ```text
//! metadata -> release -> remote_sig_url -> remote_exe_url -> remote_sig -> local_sig
//!                                                                 |            |
//!                                                                 +--> comparison
//!                                                                        |      |
//!                                              exe_content (+ remote_exe_url)   public_key
//!                                                         |                        |
//!                                                         +-----> verification <---+
//!                                                                  |
//!                                                             persist_exe -> persist_sig
//! ```
//!
//! Matching signatures end the run early as *skipped*. Any fetch, parse,
//! verification or write error ends it as *failed*. The binary and public key
//! are downloaded only when an update is actually needed, and nothing touches
//! the disk until the signature has been verified. The signature is written
//! last, after the executable it describes.
//!
//! # Modules
//!
//! - [`fetcher`] - HTTP retrieval behind the [`Fetcher`] trait
//! - [`store`] - atomic local reads and writes
//! - [`release`] - release metadata and asset lookup
//! - [`signature`] - remote/local signature comparison
//! - [`verification`] - minisign signature checks
//! - [`graph`] - the task graph executor
//! - [`lock`] - cross-process update lock

pub mod error;
pub mod fetcher;
pub mod graph;
pub mod lock;
pub mod orchestrator;
pub mod release;
pub mod signature;
pub mod store;
pub mod verification;


pub use error::{ErrorKind, Result, UpdateError};
pub use fetcher::{Body, Encoding, Fetcher, HttpFetcher};
pub use graph::{GraphError, GraphOutcome, Halt, Handle, TaskGraph};
pub use lock::UpdateLock;
pub use orchestrator::{UpdateOutcome, UpdateReport, UpdateTargets, Updater};
pub use release::{Asset, ReleaseMetadata, resolve_asset_url};
pub use signature::{Comparison, UP_TO_DATE, compare};
pub use store::LocalStore;
pub use verification::{SignatureVerifier, SignerId, VerificationError};
