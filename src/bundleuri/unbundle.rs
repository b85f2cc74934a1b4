//! Ingest a bundle and republish its branches under `refs/bundles/`.
//!
//! Branch heads from the bundle never overwrite local branches: a bundle's
//! `refs/heads/<name>` lands at `refs/bundles/<name>`, where a later fetch
//! negotiation can use it as a starting point.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::FetchError;
use crate::git::{read_bundle_header, BundleRef, ObjectId, RefStore, Repository};

const HEADS_PREFIX: &str = "refs/heads/";

/// Private namespace receiving the heads of fetched bundles.
pub const BUNDLE_REF_PREFIX: &str = "refs/bundles/";

/// Reflog message recorded on every translated ref.
const REFLOG_MESSAGE: &str = "fetched bundle";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A ref written into the bundle namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRef {
    /// Destination ref, e.g. `refs/bundles/main`.
    pub name: String,
    pub oid: ObjectId,
}

/// What an unbundle did to the ref store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnbundleSummary {
    /// Refs written, in the bundle's declaration order.
    pub translated: Vec<TranslatedRef>,
    /// Bundle refs outside `refs/heads/`, which are not republished.
    pub skipped: usize,
}

/// Map `refs/heads/<name>` to `refs/bundles/<name>`; other refs map to
/// nothing.
pub fn bundle_ref_name(refname: &str) -> Option<String> {
    let branch = refname.strip_prefix(HEADS_PREFIX)?;
    Some(format!("{BUNDLE_REF_PREFIX}{branch}"))
}

// ---------------------------------------------------------------------------
// Unbundle
// ---------------------------------------------------------------------------

/// Validate `file`, move its objects into `repo`, then translate its heads.
///
/// No ref is touched unless the objects were ingested successfully.
#[instrument(skip(repo), fields(file = %file.display()))]
pub async fn unbundle_from_file(
    repo: &Repository,
    file: &Path,
) -> Result<UnbundleSummary, FetchError> {
    let header = read_bundle_header(file)
        .await
        .map_err(|source| FetchError::NotABundle {
            path: file.to_path_buf(),
            source,
        })?;

    repo.unbundler()
        .unbundle(file, &header, repo.extra_index_pack_args())
        .await
        .map_err(|source| FetchError::Ingest {
            path: file.to_path_buf(),
            source,
        })?;

    let summary = translate_refs(repo.refs(), &header.references).await?;
    info!(
        translated = summary.translated.len(),
        skipped = summary.skipped,
        "unbundled"
    );
    Ok(summary)
}

/// Write every head in `references` into the bundle namespace, in order.
///
/// Each write is a compare-and-set against the value read just before it.
/// The first failure stops the walk; refs written before it stay written.
pub async fn translate_refs(
    refs: &dyn RefStore,
    references: &[BundleRef],
) -> Result<UnbundleSummary, FetchError> {
    let mut summary = UnbundleSummary::default();

    for bundle_ref in references {
        let Some(dest) = bundle_ref_name(&bundle_ref.name) else {
            debug!(refname = %bundle_ref.name, "skipping non-branch ref");
            summary.skipped += 1;
            continue;
        };

        let ref_error = |source| FetchError::RefUpdate {
            refname: dest.clone(),
            source,
        };

        let old = refs.read_ref(&dest).await.map_err(ref_error)?;
        refs.update_ref(REFLOG_MESSAGE, &dest, &bundle_ref.oid, old.as_ref())
            .await
            .map_err(ref_error)?;

        debug!(refname = %dest, oid = %bundle_ref.oid, "translated bundle ref");
        summary.translated.push(TranslatedRef {
            name: dest,
            oid: bundle_ref.oid.clone(),
        });
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
