use std::path::PathBuf;
use thiserror::Error;

use super::graph::GraphError;
use super::verification::VerificationError;

/// Convenient result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Failures that abort the update pipeline.
///
/// The "already up to date" outcome is deliberately absent: it travels through
/// the graph as [`Halt::Skip`](super::graph::Halt::Skip) and never becomes an
/// `UpdateError`.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The HTTP request itself failed (DNS, TLS, connection reset, body read).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with anything other than `200 OK`.
    #[error("Response Code {status} from {url}")]
    Status {
        url: String,
        status: u16,
    },

    /// A text response could not be decoded as UTF-8.
    #[error("response from {url} is not valid UTF-8 text")]
    NotText {
        url: String,
    },

    /// The release metadata is not JSON or has no usable `assets` array.
    #[error("release metadata could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested asset is not attached to the release.
    #[error("Asset {name} not found")]
    AssetNotFound {
        name: String,
    },

    /// The requested asset name is attached more than once.
    #[error("Asset {name} appears {count} times in the release")]
    DuplicateAsset {
        name: String,
        count: usize,
    },

    /// The downloaded binary failed authenticity checks.
    #[error("Unable to verify signature: {0}")]
    Verification(#[from] VerificationError),

    /// Reading local state failed for a reason other than the file being absent.
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing verified content to disk failed.
    #[error("failed to write {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The task graph itself misbehaved.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Coarse classification of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    Resolution,
    Verification,
    Persistence,
    Internal,
}

impl UpdateError {
    /// Which failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport {
                ..
            }
            | Self::Status {
                ..
            }
            | Self::NotText {
                ..
            } => ErrorKind::Transport,
            Self::Parse(_) => ErrorKind::Parse,
            Self::AssetNotFound {
                ..
            }
            | Self::DuplicateAsset {
                ..
            } => ErrorKind::Resolution,
            Self::Verification(_) => ErrorKind::Verification,
            Self::Read {
                ..
            }
            | Self::Persist {
                ..
            } => ErrorKind::Persistence,
            Self::Graph(_) => ErrorKind::Internal,
        }
    }
}
