//! `git` CLI implementation of the repository collaborators.
//!
//! Every operation shells out to the configured `git` binary with
//! `--git-dir` pointing at the target repository, using
//! [`tokio::process::Command`].

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{BundleHeader, ConfigStore, ObjectId, RefStore, Unbundler};

/// Handle on one repository through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    git_dir: PathBuf,
}

impl GitCli {
    pub fn new(binary: impl Into<String>, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            git_dir: git_dir.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--git-dir").arg(&self.git_dir);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Run `git <args>` and return its output regardless of exit status.
    async fn output(&self, args: &[String]) -> Result<Output> {
        let what = args.first().map(String::as_str).unwrap_or("git");
        self.command()
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn git {what}"))
    }

    /// Run `git <args>`, failing on a non-zero exit status.
    async fn run(&self, args: &[String]) -> Result<Output> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git {} failed (status {}): {}",
                args.join(" "),
                output.status,
                stderr.trim(),
            );
        }
        Ok(output)
    }

    /// Fail unless every prerequisite commit of the bundle is present.
    async fn check_prerequisites(&self, header: &BundleHeader) -> Result<()> {
        for prereq in &header.prerequisites {
            let args = vec![
                "cat-file".to_string(),
                "-e".to_string(),
                format!("{}^{{commit}}", prereq.oid),
            ];
            let output = self.output(&args).await?;
            if !output.status.success() {
                bail!("repository lacks prerequisite commit {}", prereq.oid);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

fn rev_parse_args(name: &str) -> Vec<String> {
    vec![
        "rev-parse".to_string(),
        "--verify".to_string(),
        "--quiet".to_string(),
        name.to_string(),
    ]
}

fn update_ref_args(
    message: &str,
    name: &str,
    new: &ObjectId,
    expected: Option<&ObjectId>,
) -> Vec<String> {
    // A null old value tells update-ref the ref must not exist yet.
    let old = expected.cloned().unwrap_or_else(|| new.null_like());
    vec![
        "update-ref".to_string(),
        "-m".to_string(),
        message.to_string(),
        "--no-deref".to_string(),
        name.to_string(),
        new.to_string(),
        old.to_string(),
    ]
}

fn replace_all_fixed_args(key: &str, value: &str) -> Vec<String> {
    vec![
        "config".to_string(),
        "--replace-all".to_string(),
        "--fixed-value".to_string(),
        key.to_string(),
        value.to_string(),
        value.to_string(),
    ]
}

fn index_pack_args(extra: &[String]) -> Vec<String> {
    let mut args = vec![
        "index-pack".to_string(),
        "--fix-thin".to_string(),
        "--stdin".to_string(),
    ];
    args.extend(extra.iter().cloned());
    args
}

/// Parse a single object id from command output such as `rev-parse`.
fn parse_oid_output(stdout: &[u8]) -> Result<ObjectId> {
    let text = String::from_utf8_lossy(stdout);
    let hex = text.trim();
    ObjectId::parse(hex).with_context(|| format!("unexpected object id in git output: {hex:?}"))
}

// ---------------------------------------------------------------------------
// RefStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl RefStore for GitCli {
    #[instrument(skip(self), fields(git_dir = %self.git_dir.display()))]
    async fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let output = self.output(&rev_parse_args(name)).await?;

        // `--verify --quiet` exits 1 with no output for a missing ref.
        if output.status.code() == Some(1) && output.stdout.is_empty() {
            debug!("ref does not exist");
            return Ok(None);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git rev-parse {name} failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }

        parse_oid_output(&output.stdout).map(Some)
    }

    #[instrument(skip(self, message), fields(git_dir = %self.git_dir.display(), %new))]
    async fn update_ref(
        &self,
        message: &str,
        name: &str,
        new: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<()> {
        self.run(&update_ref_args(message, name, new, expected))
            .await?;
        debug!("ref updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl ConfigStore for GitCli {
    #[instrument(skip(self), fields(git_dir = %self.git_dir.display()))]
    async fn get_all(&self, key: &str) -> Result<Vec<String>> {
        let args = vec!["config".to_string(), "--get-all".to_string(), key.to_string()];
        let output = self.output(&args).await?;

        // Exit status 1 means the key is not set.
        if output.status.code() == Some(1) {
            return Ok(Vec::new());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git config --get-all {key} failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_string).collect())
    }

    #[instrument(skip(self), fields(git_dir = %self.git_dir.display()))]
    async fn ensure_exact_value(&self, key: &str, value: &str) -> Result<()> {
        self.run(&replace_all_fixed_args(key, value)).await?;
        debug!("config value ensured");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unbundler
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl Unbundler for GitCli {
    /// Feed the pack data after the bundle header to
    /// `git index-pack --fix-thin --stdin`.
    #[instrument(skip(self, header), fields(bundle = %bundle.display(), git_dir = %self.git_dir.display()))]
    async fn unbundle(
        &self,
        bundle: &Path,
        header: &BundleHeader,
        extra_index_pack_args: &[String],
    ) -> Result<()> {
        self.check_prerequisites(header).await?;

        let mut file = tokio::fs::File::open(bundle)
            .await
            .with_context(|| format!("failed to open bundle {}", bundle.display()))?;
        file.seek(std::io::SeekFrom::Start(header.pack_offset))
            .await
            .context("failed to seek to bundle pack data")?;

        let mut cmd = self.command();
        cmd.args(index_pack_args(extra_index_pack_args));
        cmd.stdin(Stdio::piped());

        debug!("spawning git index-pack");
        let mut child = cmd.spawn().context("failed to spawn git index-pack")?;

        // Stream the pack to stdin, then close it to signal EOF.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::io::copy(&mut file, &mut stdin)
                .await
                .context("failed to write pack data to git index-pack")?;
            stdin
                .shutdown()
                .await
                .context("failed to close git index-pack stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("git index-pack failed")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git index-pack failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }

        debug!(
            pack = %String::from_utf8_lossy(&output.stdout).trim(),
            "git index-pack succeeded"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
