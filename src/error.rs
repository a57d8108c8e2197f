//! Error kinds surfaced by the packaging pipeline (spec §7).
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias
//! for `std::result::Result<T, PackagerError>`. There is no local retry
//! logic anywhere: the first error encountered during an emission is
//! propagated to the caller and the output sink is abandoned, possibly
//! mid-archive.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PackagerError>;

/// All error kinds this crate can return, matching spec §7 one for one.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The package description failed normalization: empty/invalid name,
    /// empty version, or an unsupported `platform`.
    #[error("invalid package description: {0}")]
    InvalidDescription(String),

    /// A content entry referenced a host path that does not exist and is
    /// not a symlink or ghost entry.
    #[error("missing source file: {0}")]
    MissingSource(PathBuf),

    /// A glob pattern matched zero files while globbing was enabled.
    #[error("glob pattern matched no files: {0}")]
    GlobNoMatch(String),

    /// Two content entries mapped to the same destination without being
    /// restricted to distinct packagers.
    #[error("destination collision: {0} is claimed by more than one entry")]
    Collision(String),

    /// Something went wrong while signing: missing key, bad passphrase, or
    /// a key incapable of signing.
    #[error("signing failed: {0}")]
    SigningFailure(String),

    /// Propagated verbatim from the underlying reader/writer.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An internal consistency check failed. These should never happen in
    /// practice; if one fires, it indicates a bug in this crate rather
    /// than a problem with caller input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PackagerError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
