//! GRF2 container archives
//!
//! A container is a flat archive of named payloads keyed by case-folded
//! logical path. The whole file is loaded into memory, mutated through
//! insert-or-replace, and written back as one image; streaming rewrite is a
//! non-goal. Entry order is preserved across a load/save cycle so an
//! unmodified round-trip is byte-identical.
//!
//! # Layout
//!
//! | Offset | Size        | Meaning                          |
//! |--------|-------------|----------------------------------|
//! | 0      | 4           | Magic `"GRF2"`                   |
//! | 4      | 8           | Reserved, zero on write          |
//! | 12     | 4           | Entry count (little-endian)      |
//! | 16..   | —           | Entry records                    |
//!
//! Each record: `pathLen:u32le`, `2·pathLen` bytes of UTF-16LE path (no NUL
//! terminator), `dataLen:u32le`, `dataLen` payload bytes.

use crate::path::fold_path;
use crate::signatures::CONTAINER_MAGIC;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Serialized header size; anything shorter is not a container
const HEADER_LEN: usize = 16;

/// A single named payload inside a container.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    path: String,
    data: Vec<u8>,
}

impl ContainerEntry {
    /// The entry path with its original casing.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The entry payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An in-memory container archive bound to a destination path.
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    entries: Vec<ContainerEntry>,
    index: HashMap<String, usize>,
}

impl Container {
    /// Create an empty container for the given destination path.
    ///
    /// Nothing is read or written until [`save`](Self::save).
    pub fn create<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load a container from disk.
    ///
    /// Fails with [`Error::OpenFailed`] when the file cannot be read and
    /// [`Error::CorruptContainer`] when the image fails magic or bounds
    /// checks.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| Error::open_failed(format!("{}: {e}", path.display())))?;
        let mut container = Self::create(path);
        container.parse(&bytes)?;
        log::debug!(
            "loaded container {} with {} entries",
            path.display(),
            container.len()
        );
        Ok(container)
    }

    fn parse(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::corrupt_container("file shorter than header"));
        }
        if bytes[..4] != CONTAINER_MAGIC {
            return Err(Error::corrupt_container("bad magic"));
        }
        // Offsets 4..12 are reserved and ignored on read.
        let mut cursor = Cursor::new(&bytes[12..]);
        let count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::corrupt_container("truncated entry count"))?;

        for _ in 0..count {
            let entry = read_entry(&mut cursor)?;
            self.insert_or_replace(&entry.0, entry.1);
        }
        Ok(())
    }

    /// The destination path this container is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in stable (insertion) order.
    pub fn entries(&self) -> impl Iterator<Item = &ContainerEntry> {
        self.entries.iter()
    }

    /// Look up a payload under any case-variant of `path`.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(&fold_path(path))
            .map(|&slot| self.entries[slot].data())
    }

    /// Insert a payload, replacing any entry under the same case-folded key.
    ///
    /// A replaced entry keeps its position in the stable order but adopts the
    /// newly provided casing.
    pub fn insert_or_replace(&mut self, path: &str, data: Vec<u8>) {
        let key = fold_path(path);
        let entry = ContainerEntry {
            path: path.to_owned(),
            data,
        };
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Remove the entry under the case-folded key, reporting whether it
    /// existed.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.index.remove(&fold_path(path)) {
            Some(slot) => {
                self.entries.remove(slot);
                for idx in self.index.values_mut() {
                    if *idx > slot {
                        *idx -= 1;
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Serialize the container to its on-disk image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload: usize = self.entries.iter().map(|e| e.data.len()).sum();
        let mut buf = Vec::with_capacity(HEADER_LEN + payload);
        buf.extend_from_slice(&CONTAINER_MAGIC);
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            let units: Vec<u16> = entry.path.encode_utf16().collect();
            buf.extend_from_slice(&(units.len() as u32).to_le_bytes());
            for unit in units {
                buf.extend_from_slice(&unit.to_le_bytes());
            }
            buf.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            buf.extend_from_slice(&entry.data);
        }
        buf
    }

    /// Write the container to its destination path.
    ///
    /// With `in_place` the destination is overwritten directly. Otherwise the
    /// image goes to a sibling temporary file which is atomically renamed
    /// over the destination, so a crash leaves either the old bytes or the
    /// new bytes, never a truncated intermediate.
    pub fn save(&self, in_place: bool) -> Result<()> {
        let image = self.to_bytes();
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|e| Error::write_failed(format!("{}: {e}", parent.display())))?;

        if in_place {
            let mut file = File::create(&self.path)
                .map_err(|e| Error::write_failed(format!("{}: {e}", self.path.display())))?;
            file.write_all(&image)
                .map_err(|e| Error::write_failed(format!("{}: {e}", self.path.display())))?;
            file.flush()
                .map_err(|e| Error::write_failed(format!("{}: {e}", self.path.display())))?;
        } else {
            let mut temp = NamedTempFile::new_in(parent)
                .map_err(|e| Error::write_failed(format!("{}: {e}", parent.display())))?;
            temp.write_all(&image)
                .map_err(|e| Error::write_failed(format!("{}: {e}", self.path.display())))?;
            temp.flush()
                .map_err(|e| Error::write_failed(format!("{}: {e}", self.path.display())))?;
            temp.persist(&self.path)
                .map_err(|e| Error::write_failed(format!("{}: {}", self.path.display(), e.error)))?;
        }
        log::debug!(
            "saved container {} ({} entries, {} bytes)",
            self.path.display(),
            self.entries.len(),
            image.len()
        );
        Ok(())
    }
}

fn read_entry(cursor: &mut Cursor<&[u8]>) -> Result<(String, Vec<u8>)> {
    let path_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::corrupt_container("truncated path length"))? as usize;
    let path_bytes = path_len
        .checked_mul(2)
        .ok_or_else(|| Error::corrupt_container("path length overflow"))?;
    if remaining(cursor) < path_bytes {
        return Err(Error::corrupt_container("path extends past end of file"));
    }
    let mut units = Vec::with_capacity(path_len);
    for _ in 0..path_len {
        units.push(
            cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| Error::corrupt_container("truncated path"))?,
        );
    }
    let path = String::from_utf16(&units)
        .map_err(|_| Error::corrupt_container("invalid UTF-16 in entry path"))?;

    let data_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::corrupt_container("truncated data length"))? as usize;
    if remaining(cursor) < data_len {
        return Err(Error::corrupt_container("payload extends past end of file"));
    }
    let mut data = vec![0u8; data_len];
    cursor
        .read_exact(&mut data)
        .map_err(|_| Error::corrupt_container("truncated payload"))?;
    Ok((path, data))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}
