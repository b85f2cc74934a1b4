//! In-memory collaborators and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use crate::config::TransportConfig;
use crate::git::{BundleHeader, ConfigStore, ObjectId, RefStore, Repository, Unbundler};

pub fn oid(c: char) -> ObjectId {
    ObjectId::parse(&c.to_string().repeat(40)).expect("valid test oid")
}

/// Write a v2 bundle with the given refs and a dummy pack to `path`.
pub fn write_bundle(path: &Path, refs: &[(&str, &ObjectId)]) {
    let mut text = String::from("# v2 git bundle\n");
    for (name, oid) in refs {
        text.push_str(&format!("{oid} {name}\n"));
    }
    text.push_str("\nPACK-DATA");
    std::fs::write(path, text).expect("write test bundle");
}

/// A remote-helper command line that runs `body` with `/bin/sh`.
///
/// The script is read by the shell rather than executed directly, so no
/// executable bit is needed.
pub fn sh_helper(dir: &Path, body: &str) -> TransportConfig {
    let script = dir.join("helper.sh");
    std::fs::write(&script, body).expect("write helper script");
    TransportConfig {
        remote_helper: vec!["/bin/sh".to_string(), script.display().to_string()],
    }
}

// ---------------------------------------------------------------------------
// Real git fixtures
// ---------------------------------------------------------------------------

/// True when a `git` binary is on `PATH`.
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run `git <args>` in `dir` with a fixed identity, returning trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=Bundle Test",
            "-c",
            "user.email=bundle@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a work tree at `dir` with one commit on `main` and return its id.
pub fn init_source_repo(dir: &Path) -> ObjectId {
    std::fs::create_dir_all(dir).expect("source dir");
    git(dir, &["init", "-q"]);
    std::fs::write(dir.join("README"), "hello\n").expect("write README");
    git(dir, &["add", "README"]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    ObjectId::parse(&git(dir, &["rev-parse", "HEAD"])).expect("HEAD oid")
}

// ---------------------------------------------------------------------------
// Ref store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryRefs {
    refs: Mutex<HashMap<String, ObjectId>>,
    /// Updates to this ref fail as if another writer got there first.
    pub conflict_on: Option<String>,
}

impl MemoryRefs {
    /// An empty store whose updates to `name` always fail.
    pub fn conflicting_on(name: &str) -> Self {
        Self {
            conflict_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.refs.lock().unwrap().get(name).cloned()
    }

    pub fn set(&self, name: &str, oid: ObjectId) {
        self.refs.lock().unwrap().insert(name.to_string(), oid);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.refs.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait::async_trait]
impl RefStore for MemoryRefs {
    async fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        Ok(self.get(name))
    }

    async fn update_ref(
        &self,
        _message: &str,
        name: &str,
        new: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<()> {
        if self.conflict_on.as_deref() == Some(name) {
            bail!("cannot lock ref {name}: reference already changed");
        }
        let mut refs = self.refs.lock().unwrap();
        if refs.get(name) != expected {
            bail!("cannot lock ref {name}: expected {expected:?}");
        }
        refs.insert(name.to_string(), new.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryConfig {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

#[async_trait::async_trait]
impl ConfigStore for MemoryConfig {
    async fn get_all(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn ensure_exact_value(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let values = entries.entry(key.to_string()).or_default();
        values.retain(|v| v != value);
        values.push(value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unbundler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingUnbundler {
    pub fail: bool,
    /// Bundle paths and extra arguments seen, in call order.
    pub calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

#[async_trait::async_trait]
impl Unbundler for RecordingUnbundler {
    async fn unbundle(
        &self,
        bundle: &Path,
        _header: &BundleHeader,
        extra_index_pack_args: &[String],
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((bundle.to_path_buf(), extra_index_pack_args.to_vec()));
        if self.fail {
            bail!("index-pack: pack has bad object");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Repository fixture
// ---------------------------------------------------------------------------

/// A repository in a temporary directory wired to in-memory collaborators.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub refs: Arc<MemoryRefs>,
    pub config: Arc<MemoryConfig>,
    pub unbundler: Arc<RecordingUnbundler>,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        Self::with(MemoryRefs::default(), RecordingUnbundler::default())
    }

    pub fn with(refs: MemoryRefs, unbundler: RecordingUnbundler) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let git_dir = dir.path().join("repo.git");
        std::fs::create_dir_all(git_dir.join("objects")).expect("objects dir");
        std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").expect("HEAD");

        let refs = Arc::new(refs);
        let config = Arc::new(MemoryConfig::default());
        let unbundler = Arc::new(unbundler);
        let repo = Repository::from_parts(
            &git_dir,
            refs.clone(),
            config.clone(),
            unbundler.clone(),
        );

        Self {
            dir,
            refs,
            config,
            unbundler,
            repo,
        }
    }

    /// Files left in the scratch area for fetched bundles.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        let scratch = self.repo.objects_dir().join("bundles");
        match std::fs::read_dir(scratch) {
            Ok(entries) => entries.map(|e| e.expect("dir entry").path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}
