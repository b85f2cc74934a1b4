//! Repository discovery and the handle the bundle pipeline works against.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, instrument};

use super::{ConfigStore, GitCli, RefStore, Unbundler};

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A local repository plus the collaborators used to mutate it.
#[derive(Clone)]
pub struct Repository {
    git_dir: PathBuf,
    refs: Arc<dyn RefStore>,
    config: Arc<dyn ConfigStore>,
    unbundler: Arc<dyn Unbundler>,
    extra_index_pack_args: Vec<String>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("extra_index_pack_args", &self.extra_index_pack_args)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open the repository at `path` (a work tree or a bare repository),
    /// backed by the `git` executable `git_binary`.
    #[instrument(fields(path = %path.display()))]
    pub async fn open(git_binary: &str, path: &Path) -> Result<Self> {
        let git_dir = discover_git_dir(path).await?;
        let git = Arc::new(GitCli::new(git_binary, &git_dir));
        Ok(Self::from_parts(git_dir, git.clone(), git.clone(), git))
    }

    /// Assemble a repository from explicit collaborators.
    pub fn from_parts(
        git_dir: impl Into<PathBuf>,
        refs: Arc<dyn RefStore>,
        config: Arc<dyn ConfigStore>,
        unbundler: Arc<dyn Unbundler>,
    ) -> Self {
        Self {
            git_dir: git_dir.into(),
            refs,
            config,
            unbundler,
            extra_index_pack_args: Vec::new(),
        }
    }

    /// Extra arguments handed to the object-indexing step of every unbundle.
    pub fn with_index_pack_args(mut self, args: Vec<String>) -> Self {
        self.extra_index_pack_args = args;
        self
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The object database directory; scratch files live beneath it.
    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir.join("objects")
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigStore {
        self.config.as_ref()
    }

    pub fn unbundler(&self) -> &dyn Unbundler {
        self.unbundler.as_ref()
    }

    pub fn extra_index_pack_args(&self) -> &[String] {
        &self.extra_index_pack_args
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Locate the git directory for `path`.
///
/// Accepts a bare repository (`HEAD` and `objects/` directly inside), a
/// work tree with a `.git` directory, or a work tree whose `.git` is a
/// `gitdir: <path>` link file.
#[instrument(fields(path = %path.display()))]
pub async fn discover_git_dir(path: &Path) -> Result<PathBuf> {
    if looks_like_git_dir(path).await {
        debug!("path is a bare repository");
        return Ok(path.to_path_buf());
    }

    let dot_git = path.join(".git");
    let meta = tokio::fs::metadata(&dot_git)
        .await
        .with_context(|| format!("not a git repository: {}", path.display()))?;

    let git_dir = if meta.is_dir() {
        dot_git
    } else {
        let link = tokio::fs::read_to_string(&dot_git)
            .await
            .with_context(|| format!("failed to read {}", dot_git.display()))?;
        let Some(target) = link.trim().strip_prefix("gitdir:") else {
            bail!("malformed .git link file: {}", dot_git.display());
        };
        path.join(target.trim())
    };

    if !looks_like_git_dir(&git_dir).await {
        bail!("not a git repository: {}", path.display());
    }
    debug!(git_dir = %git_dir.display(), "found git directory");
    Ok(git_dir)
}

/// A git directory must contain a `HEAD` file and an `objects/` directory.
async fn looks_like_git_dir(path: &Path) -> bool {
    let head_ok = tokio::fs::metadata(path.join("HEAD"))
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    let objects_ok = tokio::fs::metadata(path.join("objects"))
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    head_ok && objects_ok
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
