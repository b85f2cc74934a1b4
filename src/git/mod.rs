//! Git-side collaborators of the bundle pipeline.
//!
//! The pipeline talks to the repository through three narrow traits (ref
//! store, config store, unbundler) so it can run against the real `git`
//! binary ([`GitCli`]) or against in-memory stand-ins in tests.

pub mod bundle;
pub mod commands;
pub mod oid;
pub mod repo;

use std::path::Path;

use anyhow::Result;

pub use bundle::{read_bundle_header, BundleHeader, BundleRef, ObjectFormat};
pub use commands::GitCli;
pub use oid::ObjectId;
pub use repo::{discover_git_dir, Repository};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read and compare-and-set access to references.
#[async_trait::async_trait]
pub trait RefStore: Send + Sync {
    /// Current value of `name`, or `None` if the ref does not exist.
    async fn read_ref(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Point `name` at `new`, but only if it still holds `expected`
    /// (`None` meaning the ref must not exist).
    async fn update_ref(
        &self,
        message: &str,
        name: &str,
        new: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<()>;
}

/// Multi-valued key/value configuration.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    /// Every value stored under `key`, in file order.
    async fn get_all(&self, key: &str) -> Result<Vec<String>>;

    /// Ensure exactly one `key = value` entry exists, replacing every entry
    /// whose value equals `value` and adding one if there was none.
    async fn ensure_exact_value(&self, key: &str, value: &str) -> Result<()>;
}

/// Moves the objects of a bundle into the object database.
#[async_trait::async_trait]
pub trait Unbundler: Send + Sync {
    /// Index the pack that follows `header` in `bundle`.
    ///
    /// `extra_index_pack_args` are passed through untouched.
    async fn unbundle(
        &self,
        bundle: &Path,
        header: &BundleHeader,
        extra_index_pack_args: &[String],
    ) -> Result<()>;
}
