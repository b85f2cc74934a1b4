//! Bootstrap a local Git repository from bundle-URI snapshots.
//!
//! A bundle list names candidate bundles; each bundle is downloaded through
//! a scheme-specific [`transport`], checked, unbundled into the object
//! database, and its branches are exposed under `refs/bundles/` without
//! touching existing refs.

pub mod bundleuri;
pub mod config;
pub mod error;
pub mod git;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use bundleuri::{fetch_bundle, fetch_bundle_uri, BundleDescriptor, BundleList, BundleMode};
pub use error::{FetchError, TransportError, UnrecognizedKey};
pub use git::Repository;
pub use transport::{SchemeTransport, Transport};
