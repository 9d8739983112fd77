//! Indexed patch layout
//!
//! Payload blobs sit anywhere in the file; a trailing zlib stream holds the
//! index that points at them. The index is found by scanning backwards from
//! end-of-file for the last two-byte window that passes the zlib-header
//! probe.
//!
//! Index record layout:
//!
//! | Size | Field                                             |
//! |------|---------------------------------------------------|
//! | 1    | tag — `0` or `0xFF` terminates the index          |
//! | ≥1   | NUL-terminated path bytes                         |
//! | 4    | `offset` into the raw file (little-endian)        |
//! | 4    | `compLen` — compressed payload length at `offset` |
//! | 4    | `decompLen` — expected decompressed length        |
//! | 4    | `crc` — stored but not verified                   |

use super::PatchEntry;
use crate::compression::{inflate, is_zlib_header};
use crate::path::{decode_path, normalize_path};
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};

pub(super) fn decode(file: &[u8], body_start: usize) -> Result<Vec<PatchEntry>> {
    // Compressed payloads can contain byte pairs that look like zlib
    // headers, so candidates that fail to inflate or parse step the scan
    // back to the previous window.
    let mut search_end = file.len();
    while let Some(index_start) = find_last_stream(file, body_start, search_end) {
        match inflate(&file[index_start..]) {
            Ok(index) => {
                let entries = decode_index(&index, file);
                if !entries.is_empty() {
                    return Ok(entries);
                }
            }
            Err(e) => {
                log::trace!("candidate index at offset {index_start} failed to inflate: {e}")
            }
        }
        search_end = index_start;
    }
    Ok(Vec::new())
}

fn find_last_stream(file: &[u8], from: usize, end: usize) -> Option<usize> {
    let end = end.min(file.len());
    (from..end.saturating_sub(1))
        .rev()
        .find(|&i| is_zlib_header(&file[i..i + 2]))
}

fn decode_index(index: &[u8], file: &[u8]) -> Vec<PatchEntry> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos < index.len() {
        let tag = index[pos];
        if tag == 0 || tag == 0xFF {
            break;
        }
        pos += 1;

        let Some(nul) = index[pos..].iter().position(|&b| b == 0) else {
            break;
        };
        let raw_path = &index[pos..pos + nul];
        pos += nul + 1;

        if index.len() - pos < 16 {
            break;
        }
        let offset = LittleEndian::read_u32(&index[pos..pos + 4]) as u64;
        let comp_len = LittleEndian::read_u32(&index[pos + 4..pos + 8]) as u64;
        let decomp_len = LittleEndian::read_u32(&index[pos + 8..pos + 12]) as u64;
        let _crc = LittleEndian::read_u32(&index[pos + 12..pos + 16]);
        pos += 16;

        if comp_len == 0 || offset + comp_len > file.len() as u64 {
            log::debug!("index record points outside the file, stopping");
            break;
        }

        let path = normalize_path(&decode_path(raw_path));
        if path.is_empty() {
            log::debug!("skipping index record with empty normalized path");
            continue;
        }

        let blob = &file[offset as usize..(offset + comp_len) as usize];
        let payload = match inflate(blob) {
            Ok(data) if data.len() as u64 == decomp_len => data,
            Ok(data) => {
                log::debug!(
                    "payload for {path} inflated to {} bytes, expected {decomp_len}; stopping",
                    data.len()
                );
                break;
            }
            Err(e) => {
                log::debug!("payload for {path} failed to inflate ({e}), stopping");
                break;
            }
        };
        entries.push(PatchEntry::in_container(path, payload));
    }
    entries
}
