//! In-memory bundle list: the global `version`/`mode` plus one descriptor
//! per bundle id.
//!
//! The list renders back into the Git config INI format used by bundle-list
//! documents:
//!
//! ```ini
//! [bundle]
//!     version = 1
//!     mode = all
//!
//! [bundle "base"]
//!     uri = https://cdn.example.com/bundles/base.bundle
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Selection policy across the bundles of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BundleMode {
    /// Every bundle is required.
    #[default]
    All,
    /// Any single bundle is sufficient.
    Any,
}

impl BundleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleMode::All => "all",
            BundleMode::Any => "any",
        }
    }
}

impl FromStr for BundleMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(BundleMode::All),
            "any" => Ok(BundleMode::Any),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BundleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single candidate bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleDescriptor {
    /// Unique id within the list (the `<id>` in `bundle.<id>.uri`).
    pub id: String,
    /// Where to download the bundle from.
    pub uri: Option<String>,
    /// Local copy of the bundle; only set while a fetch is in progress.
    pub local_file: Option<PathBuf>,
}

impl BundleDescriptor {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// The manifest: list-level settings plus descriptors keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleList {
    /// Format version. Only `1` is understood.
    pub version: u32,
    pub mode: BundleMode,
    bundles: HashMap<String, BundleDescriptor>,
}

impl Default for BundleList {
    fn default() -> Self {
        Self {
            version: 1,
            mode: BundleMode::All,
            bundles: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

impl BundleList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the descriptor named `id`, inserting an empty one if absent.
    pub fn get_or_create(&mut self, id: &str) -> &mut BundleDescriptor {
        self.bundles
            .entry(id.to_string())
            .or_insert_with(|| BundleDescriptor::new(id))
    }

    pub fn get(&self, id: &str) -> Option<&BundleDescriptor> {
        self.bundles.get(id)
    }

    /// Visit every descriptor in unspecified order, stopping at the first
    /// error the visitor returns.
    pub fn try_for_each<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&BundleDescriptor) -> Result<(), E>,
    {
        for bundle in self.bundles.values() {
            visit(bundle)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BundleDescriptor> {
        self.bundles.values()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Drop every descriptor. `version` and `mode` are left as they are.
    pub fn clear(&mut self) {
        self.bundles.clear();
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl fmt::Display for BundleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[bundle]")?;
        writeln!(f, "\tversion = {}", self.version)?;
        writeln!(f, "\tmode = {}", self.mode)?;

        let mut ids: Vec<&String> = self.bundles.keys().collect();
        ids.sort();

        for id in ids {
            let bundle = &self.bundles[id];
            writeln!(f)?;
            writeln!(f, "[bundle \"{id}\"]")?;
            if let Some(uri) = &bundle.uri {
                writeln!(f, "\turi = {uri}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
