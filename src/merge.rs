//! Merge engine
//!
//! Routes parsed patch entries to their destinations: filesystem entries are
//! written next to the default container, container entries are grouped per
//! destination archive and merged by insert-or-replace. The engine is the
//! only component holding I/O handles on both source and destination.

use crate::container::Container;
use crate::observer::PatchObserver;
use crate::patch::{parse_patch, PatchEntry, TargetKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Options controlling how containers are created and persisted.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Overwrite the container file directly instead of writing a sibling
    /// temporary and atomically replacing it.
    pub in_place: bool,
    /// Treat a destination container that fails to load as empty instead of
    /// failing the operation.
    pub create_if_missing: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            in_place: false,
            create_if_missing: true,
        }
    }
}

/// Apply a patch archive to the given default container.
///
/// Reads and parses the archive, writes filesystem-targeted entries under
/// the default container's directory, merges container-targeted entries into
/// their destination archives and saves each one. On success the source
/// patch file is deleted and the observer receives `ready`; on failure the
/// patch file is preserved and the observer receives `error` with the
/// failure message. Returns whether the operation succeeded.
///
/// The observer is optional; pass `None` to run silently.
pub fn apply_patch<P, Q>(
    patch_path: P,
    default_container: Q,
    options: &PatchOptions,
    mut observer: Option<&mut dyn PatchObserver>,
) -> bool
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let patch_path = patch_path.as_ref();
    match run(patch_path, default_container.as_ref(), options, &mut observer) {
        Ok(()) => {
            if let Some(obs) = observer.as_deref_mut() {
                obs.ready();
            }
            true
        }
        Err(e) => {
            log::warn!("patch {} not applied: {e}", patch_path.display());
            if let Some(obs) = observer.as_deref_mut() {
                obs.error(&e.to_string());
            }
            false
        }
    }
}

fn run(
    patch_path: &Path,
    default_container: &Path,
    options: &PatchOptions,
    observer: &mut Option<&mut dyn PatchObserver>,
) -> Result<()> {
    emit_status(observer, &format!("Reading {}", patch_path.display()));
    let bytes = fs::read(patch_path)
        .map_err(|e| Error::open_failed(format!("{}: {e}", patch_path.display())))?;
    let entries = parse_patch(&bytes)?;

    apply_entries(entries, default_container, options, observer)?;

    // Post-success deletion keeps retried downloads from re-applying the
    // same archive. A failed delete is not worth failing the whole patch.
    if let Err(e) = fs::remove_file(patch_path) {
        log::warn!(
            "failed to delete applied patch {}: {e}",
            patch_path.display()
        );
    }
    Ok(())
}

/// Apply an already-parsed entry sequence.
///
/// Filesystem entries are written first; container buckets follow, each one
/// loaded, mutated and saved before the next is attempted.
fn apply_entries(
    entries: Vec<PatchEntry>,
    default_container: &Path,
    options: &PatchOptions,
    observer: &mut Option<&mut dyn PatchObserver>,
) -> Result<()> {
    let total = entries.len();
    let mut done = 0usize;

    let mut filesystem = Vec::new();
    let mut buckets: HashMap<PathBuf, Vec<PatchEntry>> = HashMap::new();
    for entry in entries {
        match entry.target {
            TargetKind::OnFilesystem => filesystem.push(entry),
            TargetKind::InContainer => {
                let dest = entry
                    .container
                    .clone()
                    .unwrap_or_else(|| default_container.to_path_buf());
                buckets.entry(dest).or_default().push(entry);
            }
        }
    }

    let root = default_container.parent().unwrap_or_else(|| Path::new("."));
    for entry in &filesystem {
        let out = root.join(&entry.path);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::write_failed(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&out, &entry.data)
            .map_err(|e| Error::write_failed(format!("{}: {e}", out.display())))?;
        done += 1;
        emit_progress(observer, done, total);
    }

    for (dest, group) in buckets {
        emit_status(
            observer,
            &format!("Merging {} entries into {}", group.len(), dest.display()),
        );
        let mut container = load_or_create(&dest, options)?;
        for entry in group {
            container.insert_or_replace(&entry.path, entry.data);
            done += 1;
            emit_progress(observer, done, total);
        }
        container.save(options.in_place)?;
    }
    Ok(())
}

fn load_or_create(dest: &Path, options: &PatchOptions) -> Result<Container> {
    match Container::open(dest) {
        Ok(container) => Ok(container),
        Err(e) if options.create_if_missing => {
            match e {
                Error::OpenFailed(_) => {
                    log::debug!("container {} not present, starting empty", dest.display())
                }
                _ => log::warn!(
                    "container {} failed to load ({e}), starting empty",
                    dest.display()
                ),
            }
            Ok(Container::create(dest))
        }
        Err(e) => {
            log::debug!("container {} failed to load: {e}", dest.display());
            Err(Error::missing_container(dest.display().to_string()))
        }
    }
}

fn emit_status(observer: &mut Option<&mut dyn PatchObserver>, message: &str) {
    if let Some(obs) = observer.as_deref_mut() {
        obs.status(message);
    }
}

fn emit_progress(observer: &mut Option<&mut dyn PatchObserver>, done: usize, total: usize) {
    if let Some(obs) = observer.as_deref_mut() {
        obs.progress(done, total);
    }
}
