//! Bundle-URI client side.
//!
//! Bundle lists are parsed into a [`BundleList`]; individual bundles are
//! fetched with [`fetch_bundle_uri`], which downloads, validates and
//! unbundles them, exposing their branches under `refs/bundles/`.

pub mod fetch;
pub mod list;
pub mod parse;
pub mod unbundle;

pub use fetch::{fetch_bundle, fetch_bundle_uri, find_temp_filename};
pub use list::{BundleDescriptor, BundleList, BundleMode};
pub use parse::parse_bundle_list;
pub use unbundle::{
    bundle_ref_name, translate_refs, unbundle_from_file, TranslatedRef, UnbundleSummary,
    BUNDLE_REF_PREFIX,
};
