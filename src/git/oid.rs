//! Hex object ids as they appear in bundle headers and `git` output.

use std::fmt;

/// Length in hex digits of a SHA-1 object id.
pub const SHA1_HEX_LEN: usize = 40;
/// Length in hex digits of a SHA-256 object id.
pub const SHA256_HEX_LEN: usize = 64;

/// A full-length, lower-case hex object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse a full SHA-1 or SHA-256 hex id.  Abbreviations are rejected.
    pub fn parse(hex: &str) -> Option<Self> {
        let valid_len = hex.len() == SHA1_HEX_LEN || hex.len() == SHA256_HEX_LEN;
        if valid_len && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// The all-zero id of the same hash width as `self`.
    ///
    /// `git update-ref` takes this as the old value to mean "must not exist".
    pub fn null_like(&self) -> Self {
        Self("0".repeat(self.0.len()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
