//! Manifest parsing: single `bundle.*` keys and whole bundle-list documents.
//!
//! Keys arrive one at a time and in any order (a `bundle.<id>.uri` may show
//! up before `bundle.list.version`), so [`BundleList::update`] folds each one
//! into the list independently.  [`parse_bundle_list`] flattens a Git config
//! INI document into such keys.

use anyhow::{bail, Result};

use super::list::{BundleList, BundleMode};
use crate::error::UnrecognizedKey;

const KEY_PREFIX: &str = "bundle.";

/// Id reserved for list-level settings; never names a bundle.
const LIST_ID: &str = "list";

// ---------------------------------------------------------------------------
// Single keys
// ---------------------------------------------------------------------------

impl BundleList {
    /// Apply one manifest key/value pair.
    ///
    /// Returns [`UnrecognizedKey`] when the key is not understood or the
    /// value is malformed; the list is untouched in that case.  Unknown
    /// per-bundle fields are accepted and ignored.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), UnrecognizedKey> {
        let Some(pkey) = key.strip_prefix(KEY_PREFIX) else {
            return Err(UnrecognizedKey::new(key, "not in the bundle. namespace"));
        };

        match pkey {
            "list.version" => {
                if value.trim().parse::<i64>() != Ok(1) {
                    return Err(UnrecognizedKey::new(key, "only version 1 is supported"));
                }
                self.version = 1;
                return Ok(());
            }
            "list.mode" => {
                self.mode = value
                    .parse::<BundleMode>()
                    .map_err(|()| UnrecognizedKey::new(key, "mode must be `all` or `any`"))?;
                return Ok(());
            }
            _ => {}
        }

        let Some((id, field)) = pkey.split_once('.') else {
            return Err(UnrecognizedKey::new(key, "expected bundle.<id>.<field>"));
        };
        if id == LIST_ID {
            return Err(UnrecognizedKey::new(key, "`list` is a reserved bundle id"));
        }

        let bundle = self.get_or_create(id);
        if field == "uri" {
            bundle.uri = Some(value.to_string());
        }
        // Other fields are hints for heuristics we do not implement yet.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Parse a bundle-list document in Git config syntax into `list`.
///
/// Keys the list does not understand are returned rather than treated as
/// errors.  Syntax errors (a line that is neither a section header, a
/// comment nor `key = value`) abort the parse.
pub fn parse_bundle_list(content: &str, list: &mut BundleList) -> Result<Vec<UnrecognizedKey>> {
    let mut unrecognized = Vec::new();
    let mut section: Option<Section> = None;

    for (line_no, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            section = Some(parse_section_header(line).ok_or_else(|| {
                anyhow::anyhow!("malformed section header on line {}: {line:?}", line_no + 1)
            })?);
            continue;
        }

        let Some((key, value)) = parse_key_value(line) else {
            bail!("expected `key = value` on line {}: {line:?}", line_no + 1);
        };

        let key = key.to_ascii_lowercase();
        let full_key = match &section {
            // The global `[bundle]` section holds list-level keys.
            Some(Section {
                name,
                subsection: None,
            }) if name == "bundle" => format!("{KEY_PREFIX}{LIST_ID}.{key}"),
            Some(Section {
                name,
                subsection: None,
            }) => format!("{name}.{key}"),
            Some(Section {
                name,
                subsection: Some(sub),
            }) => format!("{name}.{sub}.{key}"),
            None => bail!("key outside of any section on line {}: {line:?}", line_no + 1),
        };

        if let Err(e) = list.update(&full_key, value) {
            unrecognized.push(e);
        }
    }

    Ok(unrecognized)
}

#[derive(Debug, PartialEq, Eq)]
struct Section {
    name: String,
    subsection: Option<String>,
}

/// Parse `[name]` or `[name "subsection"]`.
///
/// Section names are case-insensitive and lower-cased; subsections keep
/// their case.
fn parse_section_header(line: &str) -> Option<Section> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();

    match inner.split_once(char::is_whitespace) {
        None => {
            if inner.is_empty() {
                return None;
            }
            Some(Section {
                name: inner.to_ascii_lowercase(),
                subsection: None,
            })
        }
        Some((name, rest)) => {
            let sub = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
            if sub.is_empty() {
                return None;
            }
            Some(Section {
                name: name.to_ascii_lowercase(),
                subsection: Some(sub.to_string()),
            })
        }
    }
}

/// Parse a `key = value` line, tolerating surrounding whitespace.
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
