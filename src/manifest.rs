//! Manifest: the authoritative list of every path a package delivers.
//! Directories carry a trailing slash; the list is sorted in reverse
//! lexical order so a package can always be removed by walking its own
//! manifest top-to-bottom without deleting a directory before its
//! contents. Modeled as set operations (union, diff) rather than stream
//! editing.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;

/// Build the manifest for everything currently under `stage_dir`, as
/// absolute paths (`/usr/bin/foo`, `/usr/share/x/` for directories).
pub fn build(stage_dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(stage_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path() != stage_dir)
        .map(|e| {
            let rel = e.path().strip_prefix(stage_dir).unwrap_or(e.path());
            let mut s = format!("/{}", rel.to_string_lossy());
            if e.file_type().is_dir() {
                s.push('/');
            }
            s
        })
        .collect();
    entries.sort();
    entries.reverse();
    entries
}

pub fn write(path: &Path, entries: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut text = entries.join("\n");
    if !entries.is_empty() {
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text.lines().map(|l| l.to_string()).collect())
}

/// `old_manifest - new_manifest`: entries delivered by the old version that
/// the new version no longer delivers.
pub fn leftover(old: &[String], new: &[String]) -> Vec<String> {
    let new_set: BTreeSet<&str> = new.iter().map(String::as_str).collect();
    old.iter().filter(|p| !new_set.contains(p.as_str())).cloned().collect()
}

/// Every path in `manifest` that falls under `/etc/` — never touched by
/// install's overwrite step or remove's deletion step.
pub fn is_under_etc(path: &str) -> bool {
    path.starts_with("/etc/") || path == "/etc/"
}
