use crate::{errors::AppResult, imaging};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Resized copies of scene images, one file per (scene file name, bound).
///
/// An entry is fresh while its mtime is not older than the source's. Entries
/// are never evicted; a changed source simply overwrites its entry.
#[derive(Debug, Clone)]
pub struct TargetCache {
    dir: PathBuf,
    max_dim: i64,
}

impl TargetCache {
    pub fn new(dir: PathBuf, max_dim: i64) -> Self {
        Self { dir, max_dim }
    }

    pub fn entry_path(&self, target: &Path) -> PathBuf {
        let stem = target.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let ext = imaging::lower_ext(target);
        self.dir.join(format!("{stem}_max{}{ext}", self.max_dim))
    }

    /// Return a path to the bounded version of `target`, building it on a miss.
    pub fn optimized(&self, target: &Path) -> AppResult<PathBuf> {
        if self.max_dim <= 0 {
            return Ok(target.to_path_buf());
        }
        let cached = self.entry_path(target);
        if is_fresh(&cached, target)? {
            debug!(target = %target.display(), cached = %cached.display(), "target cache hit");
            return Ok(cached);
        }

        debug!(target = %target.display(), cached = %cached.display(), "target cache miss");
        // each miss writes its own temp file; rename replaces the entry atomically
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp{}",
            cached.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
            uuid::Uuid::new_v4().simple(),
            imaging::lower_ext(target),
        ));
        let written = match imaging::resize_to_max_dim(target, &tmp, self.max_dim) {
            Ok(p) => p,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };
        fs::rename(&written, &cached)?;
        Ok(cached)
    }
}

fn is_fresh(cached: &Path, source: &Path) -> AppResult<bool> {
    let cached_mtime = match fs::metadata(cached) {
        Ok(m) => m.modified()?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let source_mtime: SystemTime = fs::metadata(source)?.modified()?;
    Ok(cached_mtime >= source_mtime)
}
