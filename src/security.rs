use crate::errors::{AppError, AppResult};
use std::path::{Component, Path, PathBuf};

/// Resolve a caller-supplied scene reference to a file under `root`.
///
/// The containment check runs on the lexically normalized path before the
/// target is touched; the canonical path is checked again so a symlink
/// inside the root cannot point outside it.
pub fn resolve_scene(root: &Path, scene_path: &str) -> AppResult<PathBuf> {
    if scene_path.trim().is_empty() {
        return Err(AppError::BadRequest("scene_path must not be empty".into()));
    }
    let canon_root = dunce::canonicalize(root)
        .map_err(|e| AppError::Misconfigured(format!("assets dir {}: {e}", root.display())))?;

    let candidate = normalize(&canon_root.join(scene_path));
    if !candidate.starts_with(&canon_root) {
        return Err(outside_root());
    }

    let resolved = match dunce::canonicalize(&candidate) {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Scene not found: {scene_path}")))
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };
    if !resolved.starts_with(&canon_root) {
        return Err(outside_root());
    }
    if !resolved.is_file() {
        return Err(AppError::NotFound(format!("Scene not found: {scene_path}")));
    }
    Ok(resolved)
}

/// Fold `.` and `..` segments without consulting the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                // popping past the root is a no-op, same as the OS does
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn outside_root() -> AppError {
    AppError::BadRequest("scene_path must be inside the assets directory".into())
}
