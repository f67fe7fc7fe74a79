//! Atomic JSON file writing via tempfile + rename.
//!
//! The document is serialized first, then written to a temporary file in the
//! same directory as the target and renamed over it, so an interrupted write
//! never leaves a truncated store behind.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Atomically replace `path` with the pretty-printed JSON of `value`.
///
/// # Errors
///
/// Returns an error if serialization fails, the parent directory doesn't
/// exist, writing fails, or the rename fails (e.g., cross-device).
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    content.push('\n');

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write to temp file for {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("failed to flush temp file for {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("failed to atomically replace {}", path.display()))?;
    Ok(())
}
