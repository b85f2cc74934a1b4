//! Error taxonomy for the bundle-URI pipeline.
//!
//! Collaborators (the `git` CLI wrappers) report failures as
//! [`anyhow::Error`] with context attached.  The pipeline folds those into
//! the typed errors below so callers can tell a transport problem from a
//! corrupt download from a ref-store conflict.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Manifest keys
// ---------------------------------------------------------------------------

/// A manifest key/value pair that the bundle list did not accept.
///
/// Never fatal: callers feeding a whole manifest may log it and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized bundle-list key {key:?}: {reason}")]
pub struct UnrecognizedKey {
    pub key: String,
    pub reason: &'static str,
}

impl UnrecognizedKey {
    pub(crate) fn new(key: &str, reason: &'static str) -> Self {
        Self {
            key: key.to_string(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Bundle header
// ---------------------------------------------------------------------------

/// Why a file was not accepted as a bundle container.
#[derive(Debug, Error)]
pub enum BundleHeaderError {
    #[error("failed to read bundle header")]
    Io(#[from] io::Error),

    #[error("missing or unknown bundle signature")]
    BadSignature,

    #[error("unsupported bundle capability {0:?}")]
    UnknownCapability(String),

    #[error("malformed object id {0:?}")]
    BadObjectId(String),

    #[error("malformed header line {0:?}")]
    BadLine(String),

    #[error("bundle header is not terminated by a blank line")]
    Truncated,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Failure to materialize a URI into a local file.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote helper did not advertise the `get` capability.
    #[error("remote helper {helper} has insufficient capabilities (no `get`)")]
    InsufficientCapabilities { helper: String },

    #[error("failed to spawn remote helper {helper}")]
    Spawn {
        helper: String,
        #[source]
        source: io::Error,
    },

    #[error("remote helper {helper} exited with {status}")]
    HelperExit { helper: String, status: ExitStatus },

    #[error("i/o error talking to remote helper {helper}")]
    Protocol {
        helper: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Fetch pipeline
// ---------------------------------------------------------------------------

/// Outcome of a failed bundle fetch.
///
/// Every variant is recoverable: the orchestrator has already removed its
/// temporary file by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to allocate a temporary bundle file")]
    TempFile(#[source] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{} is not a bundle", path.display())]
    NotABundle {
        path: PathBuf,
        #[source]
        source: BundleHeaderError,
    },

    #[error("failed to unbundle {}", path.display())]
    Ingest {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update {refname}")]
    RefUpdate {
        refname: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("bundle {id:?} has no uri")]
    MissingUri { id: String },
}

impl FetchError {
    /// True when the remote helper lacked the `get` capability.
    pub fn is_insufficient_capabilities(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(TransportError::InsufficientCapabilities { .. })
        )
    }
}
