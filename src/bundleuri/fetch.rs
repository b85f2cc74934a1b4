//! Fetch one bundle URI into a repository.
//!
//! The download lands in a scratch file under the object directory, is
//! checked to be a bundle, unbundled, and removed again.  A successful
//! fetch also hides the bundle refs from `git log` decorations.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use super::list::BundleDescriptor;
use super::unbundle::{unbundle_from_file, UnbundleSummary};
use crate::error::FetchError;
use crate::git::{read_bundle_header, Repository};
use crate::transport::Transport;

const SCRATCH_DIR: &str = "bundles";
const TEMP_PREFIX: &str = "tmp_uri_";
const TEMP_SUFFIX_LEN: usize = 6;

/// Config key/value keeping bundle refs out of log decorations.
pub const EXCLUDE_DECORATION_KEY: &str = "log.excludedecoration";
pub const EXCLUDE_DECORATION_VALUE: &str = "refs/bundle/";

// ---------------------------------------------------------------------------
// Temporary file
// ---------------------------------------------------------------------------

/// Pick an unused `<objects>/bundles/tmp_uri_XXXXXX` name.
///
/// A placeholder is created to reserve the name and removed straight away
/// so the transport can create the file itself.  Another process could
/// claim the name in between; that window is accepted.
pub async fn find_temp_filename(objects_dir: &Path) -> io::Result<PathBuf> {
    let scratch = objects_dir.join(SCRATCH_DIR);
    tokio::fs::create_dir_all(&scratch).await?;

    tokio::task::spawn_blocking(move || -> io::Result<PathBuf> {
        let placeholder = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .rand_bytes(TEMP_SUFFIX_LEN)
            .tempfile_in(&scratch)?;
        let path = placeholder.path().to_path_buf();
        placeholder.close()?;
        Ok(path)
    })
    .await
    .map_err(io::Error::other)?
}

/// Removes the downloaded bundle when dropped.
#[derive(Debug)]
struct TempBundle {
    path: PathBuf,
}

impl Drop for TempBundle {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temporary bundle"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Download `uri` with `transport` and unbundle it into `repo`.
#[instrument(skip(repo, transport), fields(git_dir = %repo.git_dir().display()))]
pub async fn fetch_bundle_uri(
    repo: &Repository,
    transport: &dyn Transport,
    uri: &str,
) -> Result<UnbundleSummary, FetchError> {
    let path = find_temp_filename(&repo.objects_dir())
        .await
        .map_err(FetchError::TempFile)?;
    let temp = TempBundle { path };
    fetch_into(repo, transport, uri, &temp.path).await
}

/// Fetch the bundle a descriptor points at.
///
/// `bundle.local_file` names the downloaded file while the fetch runs and
/// is cleared before returning.
#[instrument(skip(repo, transport, bundle), fields(id = %bundle.id))]
pub async fn fetch_bundle(
    repo: &Repository,
    transport: &dyn Transport,
    bundle: &mut BundleDescriptor,
) -> Result<UnbundleSummary, FetchError> {
    let Some(uri) = bundle.uri.clone() else {
        return Err(FetchError::MissingUri {
            id: bundle.id.clone(),
        });
    };

    let path = find_temp_filename(&repo.objects_dir())
        .await
        .map_err(FetchError::TempFile)?;
    let temp = TempBundle { path };
    bundle.local_file = Some(temp.path.clone());
    let result = fetch_into(repo, transport, &uri, &temp.path).await;
    bundle.local_file = None;
    result
}

async fn fetch_into(
    repo: &Repository,
    transport: &dyn Transport,
    uri: &str,
    file: &Path,
) -> Result<UnbundleSummary, FetchError> {
    transport.materialize(uri, file).await?;

    if let Err(source) = read_bundle_header(file).await {
        return Err(FetchError::NotABundle {
            path: file.to_path_buf(),
            source,
        });
    }

    let summary = unbundle_from_file(repo, file).await?;

    if let Err(e) = repo
        .config()
        .ensure_exact_value(EXCLUDE_DECORATION_KEY, EXCLUDE_DECORATION_VALUE)
        .await
    {
        warn!(error = %e, "failed to exclude bundle refs from log decorations");
    }

    info!(%uri, refs = summary.translated.len(), "fetched bundle");
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
