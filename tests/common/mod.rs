//! Shared fixture builders for integration tests
#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use ro_patch::PatchObserver;
use std::io::Write;

/// Compress bytes into a zlib stream.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One record of the streamed patch layout, flags word included.
pub fn streamed_record(path: &[u8], data: &[u8]) -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend_from_slice(&(path.len() as i32).to_le_bytes());
    rec.extend_from_slice(&(data.len() as i32).to_le_bytes());
    rec.extend_from_slice(&0u32.to_le_bytes());
    rec.extend_from_slice(path);
    rec.extend_from_slice(data);
    rec
}

/// A streamed patch archive: `ASSF` header, empty metadata, one zlib stream
/// of concatenated records.
pub fn streamed_patch(records: &[u8]) -> Vec<u8> {
    let mut bytes = b"ASSF".to_vec();
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&deflate(records));
    bytes
}

/// An indexed patch archive built from `(path, payload)` pairs: compressed
/// blobs first, the zlib-compressed index trailing.
pub fn indexed_patch(files: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut bytes = b"ASSF".to_vec();
    bytes.extend_from_slice(&0u32.to_le_bytes());
    let mut index = Vec::new();
    for (path, payload) in files {
        let blob = deflate(payload);
        let offset = bytes.len() as u32;
        bytes.extend_from_slice(&blob);
        index.push(1);
        index.extend_from_slice(path);
        index.push(0);
        index.extend_from_slice(&offset.to_le_bytes());
        index.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        index.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        index.extend_from_slice(&0u32.to_le_bytes()); // crc, unverified
    }
    bytes.extend_from_slice(&deflate(&index));
    bytes
}

/// A serialized container image from `(path, payload)` pairs.
pub fn container_image(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"GRF2");
    image.extend_from_slice(&[0u8; 8]);
    image.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (path, data) in entries {
        let units: Vec<u16> = path.encode_utf16().collect();
        image.extend_from_slice(&(units.len() as u32).to_le_bytes());
        for unit in units {
            image.extend_from_slice(&unit.to_le_bytes());
        }
        image.extend_from_slice(&(data.len() as u32).to_le_bytes());
        image.extend_from_slice(data);
    }
    image
}

/// Observer event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status(String),
    Progress(usize, usize),
    Error(String),
    Ready,
}

/// Observer that records every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<Event>,
}

impl RecordingObserver {
    pub fn progress_events(&self) -> Vec<(usize, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(done, total) => Some((*done, *total)),
                _ => None,
            })
            .collect()
    }

    pub fn terminal(&self) -> Option<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Ready | Event::Error(_)))
            .last()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Ready | Event::Error(_)))
            .count()
    }
}

impl PatchObserver for RecordingObserver {
    fn status(&mut self, message: &str) {
        self.events.push(Event::Status(message.to_owned()));
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.events.push(Event::Progress(done, total));
    }

    fn error(&mut self, message: &str) {
        self.events.push(Event::Error(message.to_owned()));
    }

    fn ready(&mut self) {
        self.events.push(Event::Ready);
    }
}
