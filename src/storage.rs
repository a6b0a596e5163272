//! File storage abstraction and filename collision resolution.
//!
//! The pipeline only touches disk through the [`Storage`] trait, so tests
//! (and future backends) can substitute their own implementation.

use std::path::Path;

use crate::error::{PluckError, Result};

/// Maximum number of `stem_N.ext` candidates tried before giving up on an
/// attachment instead of risking an overwrite.
const MAX_COLLISION_ATTEMPTS: usize = 10_000;

/// Primitive filesystem operations used by the pipeline.
pub trait Storage {
    /// Whether a file already exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Write `data` to `path`, replacing nothing the caller hasn't checked.
    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Create `path` as a directory; pre-existing is fine.
    fn ensure_dir(&self, path: &Path) -> Result<()>;
}

/// [`Storage`] over the local filesystem.
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<()> {
        std::fs::write(path, data).map_err(|e| PluckError::io(path, e))
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| PluckError::io(path, e))
    }
}

/// Return a filename under `dir` that does not currently exist.
///
/// `desired` is returned unchanged when free; otherwise `stem_1.ext`,
/// `stem_2.ext`, … are tried, re-checking existence on every candidate.
/// The re-check matters: the directory mutates during a run as earlier
/// attachments are written, so candidates must be tested against live
/// state, never a snapshot.
///
/// The check-then-write pair is only safe because a run is single-threaded;
/// concurrent writers would need exclusive-create semantics instead.
pub fn resolve_collision(storage: &dyn Storage, dir: &Path, desired: &str) -> Result<String> {
    if !storage.exists(&dir.join(desired)) {
        return Ok(desired.to_string());
    }

    let name = Path::new(desired);
    let stem = name.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = name.extension().and_then(|e| e.to_str()).unwrap_or("");

    for i in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = if ext.is_empty() {
            format!("{stem}_{i}")
        } else {
            format!("{stem}_{i}.{ext}")
        };
        if !storage.exists(&dir.join(&candidate)) {
            return Ok(candidate);
        }
    }

    Err(PluckError::CollisionOverflow {
        name: desired.to_string(),
    })
}
