//! URI transports: turn a bundle URI into a local file.
//!
//! `http:` and `https:` URIs go through a remote helper process; `file://`
//! URIs and bare paths are copied from the local filesystem.

pub mod helper;
pub mod local;

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::config::TransportConfig;
use crate::error::TransportError;

pub use helper::RemoteHelperTransport;
pub use local::LocalTransport;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Writes the resource named by a URI to a local path.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn materialize(&self, uri: &str, dest: &Path) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Scheme resolution
// ---------------------------------------------------------------------------

/// Where a bundle URI points, after scheme resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource<'a> {
    /// Fetched over http(s) by a remote helper; carries the full URI.
    Remote(&'a str),
    /// A path on the local filesystem.
    Local(PathBuf),
}

impl<'a> BundleSource<'a> {
    pub fn parse(uri: &'a str) -> Self {
        if uri.starts_with("https:") || uri.starts_with("http:") {
            return BundleSource::Remote(uri);
        }
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        BundleSource::Local(PathBuf::from(path))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Dispatches each URI to the transport for its scheme.
#[derive(Debug, Clone)]
pub struct SchemeTransport {
    local: LocalTransport,
    remote: RemoteHelperTransport,
}

impl SchemeTransport {
    pub fn new(local: LocalTransport, remote: RemoteHelperTransport) -> Self {
        Self { local, remote }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(LocalTransport, RemoteHelperTransport::from_config(config))
    }
}

#[async_trait::async_trait]
impl Transport for SchemeTransport {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn materialize(&self, uri: &str, dest: &Path) -> Result<(), TransportError> {
        match BundleSource::parse(uri) {
            BundleSource::Remote(uri) => self.remote.materialize(uri, dest).await,
            BundleSource::Local(path) => self.local.copy(&path, dest).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
