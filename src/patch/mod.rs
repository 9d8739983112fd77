//! Thor patch archive parsing
//!
//! A patch archive bundles many logical files behind a fixed `ASSF` header.
//! Two physical layouts coexist in the wild:
//!
//! 1. **Streamed** — all records live in one forward zlib stream that starts
//!    somewhere after the header.
//! 2. **Indexed** — payload blobs are scattered through the file and a
//!    trailing zlib stream holds an index pointing at them.
//!
//! The parser attempts streamed decoding first and falls back to indexed.
//! Both decoders stop cleanly at the first record that no longer parses,
//! keeping whatever was accumulated; producing zero entries overall is the
//! only parse-level failure ([`Error::NoEntries`]).

mod indexed;
mod streamed;

use crate::signatures::PATCH_MAGIC;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::path::PathBuf;

/// Destination of a patch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Merge into a container archive.
    InContainer,
    /// Write to the filesystem next to the default container.
    OnFilesystem,
}

/// A single logical file carried by a patch archive.
///
/// Created by the parser and consumed exactly once by the merge engine.
#[derive(Debug, Clone)]
pub struct PatchEntry {
    /// Normalized logical path: forward slashes, relative, no `..` segments.
    pub path: String,
    /// Where the payload goes.
    pub target: TargetKind,
    /// Specific container to merge into; `None` means the caller-supplied
    /// default container.
    pub container: Option<PathBuf>,
    /// Fully decompressed file contents.
    pub data: Vec<u8>,
}

impl PatchEntry {
    pub(crate) fn in_container(path: String, data: Vec<u8>) -> Self {
        Self {
            path,
            target: TargetKind::InContainer,
            container: None,
            data,
        }
    }
}

/// Parse a patch archive image into its entry sequence.
///
/// Validates the `ASSF` header, then tries the streamed layout and falls
/// back to the indexed layout. Fails with [`Error::CorruptPatch`] on header
/// problems and [`Error::NoEntries`] when neither layout yields an entry.
pub fn parse_patch(bytes: &[u8]) -> Result<Vec<PatchEntry>> {
    let body_start = header_end(bytes)?;

    match streamed::decode(bytes, body_start) {
        Ok(entries) if !entries.is_empty() => {
            log::debug!("streamed layout yielded {} entries", entries.len());
            return Ok(entries);
        }
        Ok(_) => log::debug!("streamed layout yielded no entries, trying indexed"),
        Err(e) => log::debug!("streamed layout failed ({e}), trying indexed"),
    }

    match indexed::decode(bytes, body_start) {
        Ok(entries) if !entries.is_empty() => {
            log::debug!("indexed layout yielded {} entries", entries.len());
            Ok(entries)
        }
        Ok(_) => Err(Error::NoEntries),
        Err(e) => {
            log::debug!("indexed layout failed: {e}");
            Err(Error::NoEntries)
        }
    }
}

/// Validate the fixed header and return the offset where the body begins.
fn header_end(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < 8 {
        return Err(Error::corrupt_patch("truncated header"));
    }
    if bytes[..4] != PATCH_MAGIC {
        return Err(Error::corrupt_patch("bad magic"));
    }
    let meta_len = LittleEndian::read_u32(&bytes[4..8]) as usize;
    8usize
        .checked_add(meta_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::corrupt_patch("metadata extends past end of file"))
}
