//! Streamed patch layout
//!
//! All records are concatenated inside one zlib stream. The stream is found
//! by scanning forward from the header for the first two-byte window that
//! passes the zlib-header probe, then inflated to end-of-file.
//!
//! Record layout inside the inflated buffer:
//!
//! | Size      | Field                                    |
//! |-----------|------------------------------------------|
//! | 4         | `pathLen` (signed, little-endian)        |
//! | 4         | `dataLen` (signed, little-endian)        |
//! | 4         | reserved flags, present only when the    |
//! |           | remaining buffer can hold both strings   |
//! |           | plus these four bytes                    |
//! | `pathLen` | path bytes (codepage-encoded)            |
//! | `dataLen` | payload bytes                            |

use super::PatchEntry;
use crate::compression::{inflate, is_zlib_header};
use crate::path::{decode_path, normalize_path};
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};

pub(super) fn decode(file: &[u8], body_start: usize) -> Result<Vec<PatchEntry>> {
    let Some(stream_start) = find_first_stream(file, body_start) else {
        return Ok(Vec::new());
    };
    let records = inflate(&file[stream_start..])?;
    Ok(decode_records(&records))
}

fn find_first_stream(file: &[u8], from: usize) -> Option<usize> {
    (from..file.len().saturating_sub(1)).find(|&i| is_zlib_header(&file[i..i + 2]))
}

fn decode_records(buf: &[u8]) -> Vec<PatchEntry> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    loop {
        if buf.len() - pos < 8 {
            break;
        }
        let path_len = LittleEndian::read_i32(&buf[pos..pos + 4]);
        let data_len = LittleEndian::read_i32(&buf[pos + 4..pos + 8]);
        if path_len < 0 || data_len <= 0 {
            break;
        }
        pos += 8;
        let path_len = path_len as usize;
        let data_len = data_len as usize;
        let body = path_len as u64 + data_len as u64;

        // Reserved flags word, only present when the record leaves room for
        // it. Nothing depends on its value.
        if (buf.len() - pos) as u64 >= body + 4 {
            pos += 4;
        }
        if ((buf.len() - pos) as u64) < body {
            break;
        }

        let raw_path = &buf[pos..pos + path_len];
        let payload = &buf[pos + path_len..pos + path_len + data_len];
        pos += path_len + data_len;

        // Path fields may carry a C-string terminator inside the declared
        // length; everything from the first NUL on is not path data.
        let nul = raw_path.iter().position(|&b| b == 0).unwrap_or(path_len);
        let path = normalize_path(&decode_path(&raw_path[..nul]));
        if path.is_empty() {
            log::debug!("skipping streamed record with empty normalized path");
            continue;
        }
        entries.push(PatchEntry::in_container(path, payload.to_vec()));
    }
    entries
}
