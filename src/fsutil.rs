//! Small filesystem utilities.

use globset::{Glob, GlobMatcher};
use serde::Serialize;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{FlameError, FlameResult};

/// Files directly inside `dir` whose name matches `pattern`, sorted by path.
/// A missing directory yields an empty list.
pub fn list_matching(dir: &Path, pattern: &str) -> FlameResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let matcher = compile_glob(pattern)?;
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            FlameError::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other(msg)))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .path()
            .file_name()
            .is_some_and(|name| matcher.is_match(name))
        {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

fn compile_glob(pattern: &str) -> FlameResult<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| FlameError::InvalidArgument(format!("invalid glob {pattern:?}: {e}")))
}

pub fn write_json(path: &Path, value: &impl Serialize) -> FlameResult<()> {
    write_bytes(path, &serde_json::to_vec_pretty(value)?)
}

pub fn write_text(path: &Path, value: &str) -> FlameResult<()> {
    write_bytes(path, value.as_bytes())
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> FlameResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
