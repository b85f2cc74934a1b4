//! Bundle container header reader.
//!
//! A bundle starts with a text header followed by a packfile:
//!
//! ```text
//! # v3 git bundle
//! @object-format=sha1
//! -<prerequisite oid> <comment>
//! <oid> refs/heads/main
//!
//! <pack data>
//! ```
//!
//! Only the header is interpreted here; the pack is handed to
//! `git index-pack` by the [`Unbundler`](super::Unbundler).

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, instrument};

use super::oid::{ObjectId, SHA1_HEX_LEN, SHA256_HEX_LEN};
use crate::error::BundleHeaderError;

const V2_SIGNATURE: &str = "# v2 git bundle\n";
const V3_SIGNATURE: &str = "# v3 git bundle\n";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectFormat {
    #[default]
    Sha1,
    Sha256,
}

impl ObjectFormat {
    fn hex_len(self) -> usize {
        match self {
            ObjectFormat::Sha1 => SHA1_HEX_LEN,
            ObjectFormat::Sha256 => SHA256_HEX_LEN,
        }
    }
}

/// A commit the receiving repository must already have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisite {
    pub oid: ObjectId,
    pub comment: String,
}

/// A ref advertised by the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRef {
    pub name: String,
    pub oid: ObjectId,
}

/// Parsed bundle header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    /// Container version, 2 or 3.
    pub version: u8,
    pub object_format: ObjectFormat,
    /// Object filter the bundle was created with (v3 `@filter=`).
    pub filter: Option<String>,
    pub prerequisites: Vec<Prerequisite>,
    /// References in declaration order.
    pub references: Vec<BundleRef>,
    /// Byte offset of the first byte of pack data.
    pub pack_offset: u64,
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read and validate the header of the bundle at `path`.
#[instrument(fields(path = %path.display()))]
pub async fn read_bundle_header(path: &Path) -> Result<BundleHeader, BundleHeaderError> {
    let file = tokio::fs::File::open(path).await?;
    let header = read_header(&mut BufReader::new(file)).await?;
    debug!(
        version = header.version,
        refs = header.references.len(),
        prerequisites = header.prerequisites.len(),
        "read bundle header"
    );
    Ok(header)
}

/// Parse a bundle header from `reader`, leaving it positioned at the pack.
pub async fn read_header<R>(reader: &mut R) -> Result<BundleHeader, BundleHeaderError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut offset = reader.read_line(&mut line).await? as u64;

    let version = match line.as_str() {
        V2_SIGNATURE => 2,
        V3_SIGNATURE => 3,
        _ => return Err(BundleHeaderError::BadSignature),
    };

    let mut header = BundleHeader {
        version,
        object_format: ObjectFormat::default(),
        filter: None,
        prerequisites: Vec::new(),
        references: Vec::new(),
        pack_offset: 0,
    };

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        offset += n as u64;

        // EOF, or a last line with no newline: the header never ended.
        let Some(content) = line.strip_suffix('\n') else {
            return Err(BundleHeaderError::Truncated);
        };

        if content.is_empty() {
            break;
        }

        if let Some(capability) = content.strip_prefix('@') {
            if version < 3 {
                return Err(BundleHeaderError::BadLine(content.to_string()));
            }
            parse_capability(capability, &mut header)?;
            continue;
        }

        if let Some(prereq) = content.strip_prefix('-') {
            let (hex, comment) = prereq.split_once(' ').unwrap_or((prereq, ""));
            header.prerequisites.push(Prerequisite {
                oid: parse_oid(hex, header.object_format)?,
                comment: comment.to_string(),
            });
            continue;
        }

        let Some((hex, name)) = content.split_once(' ') else {
            return Err(BundleHeaderError::BadLine(content.to_string()));
        };
        header.references.push(BundleRef {
            name: name.to_string(),
            oid: parse_oid(hex, header.object_format)?,
        });
    }

    header.pack_offset = offset;
    Ok(header)
}

fn parse_capability(capability: &str, header: &mut BundleHeader) -> Result<(), BundleHeaderError> {
    let unknown = || BundleHeaderError::UnknownCapability(capability.to_string());
    let (key, value) = capability.split_once('=').ok_or_else(unknown)?;

    match key {
        "object-format" => {
            header.object_format = match value {
                "sha1" => ObjectFormat::Sha1,
                "sha256" => ObjectFormat::Sha256,
                _ => return Err(unknown()),
            };
        }
        "filter" => header.filter = Some(value.to_string()),
        _ => return Err(unknown()),
    }
    Ok(())
}

fn parse_oid(hex: &str, format: ObjectFormat) -> Result<ObjectId, BundleHeaderError> {
    if hex.len() != format.hex_len() {
        return Err(BundleHeaderError::BadObjectId(hex.to_string()));
    }
    ObjectId::parse(hex).ok_or_else(|| BundleHeaderError::BadObjectId(hex.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(c: char) -> String {
        c.to_string().repeat(40)
    }

    #[tokio::test]
    async fn v2_header_with_refs_and_prereqs() {
        let text = format!(
            "# v2 git bundle\n-{} base commit\n{} refs/heads/main\n{} refs/tags/v1\n\nPACK",
            oid('1'),
            oid('a'),
            oid('b'),
        );
        let mut reader = text.as_bytes();
        let header = read_header(&mut reader).await.unwrap();

        assert_eq!(header.version, 2);
        assert_eq!(header.prerequisites.len(), 1);
        assert_eq!(header.prerequisites[0].comment, "base commit");
        assert_eq!(header.references.len(), 2);
        assert_eq!(header.references[0].name, "refs/heads/main");
        assert_eq!(header.references[0].oid.as_str(), oid('a'));
        assert_eq!(header.pack_offset as usize, text.len() - "PACK".len());
        assert_eq!(reader, b"PACK");
    }

    #[tokio::test]
    async fn v3_capabilities() {
        let sha256 = "c".repeat(64);
        let text = format!(
            "# v3 git bundle\n@object-format=sha256\n@filter=blob:none\n{sha256} refs/heads/main\n\n"
        );
        let header = read_header(&mut text.as_bytes()).await.unwrap();

        assert_eq!(header.version, 3);
        assert_eq!(header.object_format, ObjectFormat::Sha256);
        assert_eq!(header.filter.as_deref(), Some("blob:none"));
        assert_eq!(header.references[0].oid.as_str(), sha256);
    }

    #[tokio::test]
    async fn rejects_bad_signature() {
        let err = read_header(&mut "# v9 git bundle\n\n".as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, BundleHeaderError::BadSignature));

        let err = read_header(&mut "".as_bytes()).await.unwrap_err();
        assert!(matches!(err, BundleHeaderError::BadSignature));
    }

    #[tokio::test]
    async fn rejects_unterminated_header() {
        let text = format!("# v2 git bundle\n{} refs/heads/main\n", oid('a'));
        let err = read_header(&mut text.as_bytes()).await.unwrap_err();
        assert!(matches!(err, BundleHeaderError::Truncated));
    }

    #[tokio::test]
    async fn rejects_unknown_capability_and_v2_capabilities() {
        let err = read_header(&mut "# v3 git bundle\n@frobnicate=yes\n\n".as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, BundleHeaderError::UnknownCapability(_)));

        let err = read_header(&mut "# v2 git bundle\n@object-format=sha1\n\n".as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, BundleHeaderError::BadLine(_)));
    }

    #[tokio::test]
    async fn rejects_wrong_width_oid() {
        let text = format!("# v2 git bundle\n{} refs/heads/main\n\n", "a".repeat(64));
        let err = read_header(&mut text.as_bytes()).await.unwrap_err();
        assert!(matches!(err, BundleHeaderError::BadObjectId(_)));
    }

    #[tokio::test]
    async fn reads_header_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.bundle");
        let bad = dir.path().join("bad.bundle");
        std::fs::write(&good, format!("# v2 git bundle\n{} HEAD\n\n", oid('e'))).unwrap();
        std::fs::write(&bad, "not a bundle at all").unwrap();

        let header = read_bundle_header(&good).await.unwrap();
        assert_eq!(header.references[0].name, "HEAD");
        assert!(matches!(
            read_bundle_header(&bad).await,
            Err(BundleHeaderError::BadSignature)
        ));
        assert!(matches!(
            read_bundle_header(&dir.path().join("missing")).await,
            Err(BundleHeaderError::Io(_))
        ));
    }
}
