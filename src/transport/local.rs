//! Local filesystem transport: a byte-for-byte copy.

use std::path::Path;

use tracing::{debug, instrument};

use super::Transport;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    /// Copy `from` to `to`, creating or truncating `to`.
    #[instrument(fields(from = %from.display(), to = %to.display()))]
    pub async fn copy(&self, from: &Path, to: &Path) -> Result<(), TransportError> {
        let bytes = tokio::fs::copy(from, to)
            .await
            .map_err(|source| TransportError::Copy {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
        debug!(bytes, "copied local bundle");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn materialize(&self, uri: &str, dest: &Path) -> Result<(), TransportError> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        self.copy(Path::new(path), dest).await
    }
}
