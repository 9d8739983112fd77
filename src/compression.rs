//! Zlib inflation and stream probing
//!
//! Patch archives embed zlib streams (RFC 1950) with no framing of their own;
//! the parser locates them by probing for a plausible two-byte zlib header.

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// CMF byte for deflate with a 32 KiB window, the only value the format uses
const ZLIB_CMF: u8 = 0x78;

/// FLG bytes observed in the wild for the common compression levels
const ZLIB_FLG: [u8; 4] = [0x01, 0x5E, 0x9C, 0xDA];

/// Check whether a two-byte window is a plausible zlib stream header.
///
/// Accepts only deflate with a 32 KiB window and one of the common
/// FLEVEL/FCHECK combinations, and requires the RFC 1950 check
/// `(cmf << 8 | flg) % 31 == 0` to hold.
///
/// # Examples
///
/// ```
/// use ro_patch::compression::is_zlib_header;
///
/// assert!(is_zlib_header(&[0x78, 0x9C]));
/// assert!(!is_zlib_header(&[0x1F, 0x8B])); // gzip, not zlib
/// ```
pub fn is_zlib_header(window: &[u8]) -> bool {
    if window.len() < 2 {
        return false;
    }
    let cmf = window[0];
    let flg = window[1];
    if cmf != ZLIB_CMF || !ZLIB_FLG.contains(&flg) {
        return false;
    }
    ((u16::from(cmf) << 8) | u16::from(flg)) % 31 == 0
}

/// Inflate a zlib stream fully into memory.
///
/// The caller does not know the decompressed size in advance; output grows
/// incrementally. Any decoder failure is reported as [`Error::CorruptStream`].
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(e) => {
            log::debug!(
                "zlib inflation failed after {} output bytes: {e}",
                out.len()
            );
            log::trace!("first bytes of stream: {:02X?}", &data[..16.min(data.len())]);
            Err(Error::corrupt_stream(e.to_string()))
        }
    }
}
