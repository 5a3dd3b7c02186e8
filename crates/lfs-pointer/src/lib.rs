//! LFS pointer file model and text codec.
//!
//! A pointer file is a small text body that stands in for externally-stored
//! large content. The body is a sequence of `key value` lines: a `version`
//! URL first, optional `ext-<priority>-<name>` extension lines, the content
//! `oid`, and the content `size` in bytes.

use bstr::ByteSlice;
use serde::Serialize;

/// Pointer bodies are always small text; anything this large or larger
/// cannot be a pointer.
pub const MAX_POINTER_BYTES: usize = 1024;

/// Spec URL written by current clients.
pub const VERSION_URL: &str = "https://git-lfs.github.com/spec/v1";

/// Version URL prefixes accepted on decode (current plus legacy).
const VERSION_PREFIXES: &[&str] = &["https://git-lfs", "https://hawser"];

/// Errors from decoding a pointer body.
#[derive(Debug, thiserror::Error)]
pub enum PointerError {
    #[error("pointer too large: {0} bytes")]
    TooLarge(usize),

    #[error("missing version line")]
    MissingVersion,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("missing oid")]
    MissingOid,

    #[error("invalid oid: {0}")]
    InvalidOid(String),

    #[error("missing size")]
    MissingSize,

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("malformed line: {0}")]
    MalformedLine(String),

    #[error("unexpected key: {0}")]
    UnexpectedKey(String),
}

/// A decoded pointer: content hash, byte length, optional extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pointer {
    /// Version URL from the first line.
    pub version: String,
    /// Content hash, without the `sha256:` prefix.
    pub oid: String,
    /// Byte length of the externally-stored content.
    pub size: u64,
    /// Extension entries, in priority order.
    pub extensions: Vec<PointerExtension>,
}

/// One `ext-<priority>-<name>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerExtension {
    pub name: String,
    pub priority: u32,
    /// Content hash before this extension was applied.
    pub oid: String,
}

/// Decode a pointer body.
///
/// Best-effort classifier: callers probe arbitrary small blobs with this and
/// treat failure as "not a pointer", so every malformation is a distinct
/// non-panicking error.
pub fn decode(data: &[u8]) -> Result<Pointer, PointerError> {
    if data.len() >= MAX_POINTER_BYTES {
        return Err(PointerError::TooLarge(data.len()));
    }

    let mut version = None;
    let mut oid = None;
    let mut size = None;
    let mut extensions = Vec::new();

    for line in data.lines() {
        if line.is_empty() {
            continue;
        }
        let line = line
            .to_str()
            .map_err(|_| PointerError::MalformedLine(String::from_utf8_lossy(line).into_owned()))?;
        let (key, value) = line
            .split_once(' ')
            .ok_or_else(|| PointerError::MalformedLine(line.to_string()))?;

        // The version line must come first.
        if version.is_none() {
            if key != "version" {
                return Err(PointerError::MissingVersion);
            }
            if !VERSION_PREFIXES.iter().any(|p| value.starts_with(p)) {
                return Err(PointerError::UnsupportedVersion(value.to_string()));
            }
            version = Some(value.to_string());
            continue;
        }

        match key {
            "version" => return Err(PointerError::UnexpectedKey(key.to_string())),
            "oid" => oid = Some(parse_oid(value)?),
            "size" => {
                size = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| PointerError::InvalidSize(value.to_string()))?,
                )
            }
            _ if key.starts_with("ext-") => extensions.push(parse_extension(key, value)?),
            _ => return Err(PointerError::UnexpectedKey(key.to_string())),
        }
    }

    let pointer = Pointer {
        version: version.ok_or(PointerError::MissingVersion)?,
        oid: oid.ok_or(PointerError::MissingOid)?,
        size: size.ok_or(PointerError::MissingSize)?,
        extensions,
    };
    Ok(pointer)
}

/// Encode a pointer back to its canonical text form.
pub fn encode(pointer: &Pointer) -> Vec<u8> {
    let mut out = format!("version {}\n", pointer.version).into_bytes();
    let mut exts: Vec<&PointerExtension> = pointer.extensions.iter().collect();
    exts.sort_by_key(|e| e.priority);
    for ext in exts {
        out.extend_from_slice(
            format!("ext-{}-{} sha256:{}\n", ext.priority, ext.name, ext.oid).as_bytes(),
        );
    }
    out.extend_from_slice(format!("oid sha256:{}\n", pointer.oid).as_bytes());
    out.extend_from_slice(format!("size {}\n", pointer.size).as_bytes());
    out
}

fn parse_oid(value: &str) -> Result<String, PointerError> {
    let hex = value
        .strip_prefix("sha256:")
        .ok_or_else(|| PointerError::InvalidOid(value.to_string()))?;
    if hex.len() != 64 || !hex.bytes().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(PointerError::InvalidOid(value.to_string()));
    }
    Ok(hex.to_string())
}

fn parse_extension(key: &str, value: &str) -> Result<PointerExtension, PointerError> {
    // key is `ext-<priority>-<name>`
    let rest = key.strip_prefix("ext-").unwrap_or(key);
    let (priority, name) = rest
        .split_once('-')
        .ok_or_else(|| PointerError::MalformedLine(key.to_string()))?;
    let priority = priority
        .parse::<u32>()
        .map_err(|_| PointerError::MalformedLine(key.to_string()))?;
    if name.is_empty() {
        return Err(PointerError::MalformedLine(key.to_string()));
    }
    let oid = parse_oid(value)?;
    Ok(PointerExtension {
        name: name.to_string(),
        priority,
        oid,
    })
}
