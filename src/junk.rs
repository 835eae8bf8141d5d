//! Junk-prune stage: delete a configurable list of directories
//! (and the one always-conflicting file) from the stage before it's
//! manifested and tarred.

use std::path::Path;

use crate::error::Result;

/// Remove every configured junk path, relative to `stage_dir`, that exists.
/// Missing entries are silently skipped — pruning is best-effort cleanup,
/// not a correctness requirement.
pub fn prune(stage_dir: &Path, junk: &[std::path::PathBuf]) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for rel in junk {
        let path = stage_dir.join(rel);
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
            removed.push(rel.display().to_string());
        } else if path.is_file() {
            std::fs::remove_file(&path)?;
            removed.push(rel.display().to_string());
        }
    }
    Ok(removed)
}
