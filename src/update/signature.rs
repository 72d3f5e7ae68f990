use tracing::{debug, info};

/// Message reported when the local build already matches the release.
pub const UP_TO_DATE: &str = "Remote and local signatures match. Update not required.";

/// Result of comparing the remote signature with the one on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Byte-for-byte identical: the local build is current.
    Match,
    /// Anything else, including a missing local signature.
    Differ,
}

/// Compare two armored signatures by exact, case-sensitive equality.
pub fn compare(remote: &str, local: &str) -> Comparison {
    debug!("Comparing remote and local signatures");

    if remote == local {
        info!("{UP_TO_DATE}");
        Comparison::Match
    } else {
        info!("Remote and local signatures differ. Update required.");
        Comparison::Differ
    }
}
