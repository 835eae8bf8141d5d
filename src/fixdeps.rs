//! Fix-dependencies stage: walk the stage for ELF files,
//! resolve each dynamic library reference to the installed package that owns
//! it, and record that as a runtime dependency.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::Config;
use crate::elf;
use crate::error::Result;
use crate::installed_db;

/// Toolchain libraries that are always present and never worth recording as
/// an explicit dependency.
const TOOLCHAIN_BLOCKLIST: &[&str] = &[
    "ld-linux-x86-64.so.2",
    "libc.so.6",
    "libm.so.6",
    "libdl.so.2",
    "libpthread.so.0",
    "librt.so.1",
    "libgcc_s.so.1",
    "libstdc++.so.6",
];

/// Library search directories, relative to the target root, checked in order.
const LIB_DIRS: &[&str] = &["usr/lib", "lib", "usr/lib64", "lib64"];

/// Resolve a `DT_NEEDED` soname to its canonical (symlink-resolved) path
/// under the target root, if present anywhere on the library search path.
fn resolve_library(target_root: &Path, libname: &str) -> Option<PathBuf> {
    for dir in LIB_DIRS {
        let candidate = target_root.join(dir).join(libname);
        if candidate.exists() {
            return fs::canonicalize(&candidate).ok();
        }
    }
    None
}

/// Turn a canonicalized on-disk path back into the absolute, target-root
/// relative form manifests store (e.g. `/usr/lib/libfoo.so.1`).
fn to_manifest_path(target_root: &Path, canonical: &Path) -> String {
    let rel = canonical.strip_prefix(target_root).unwrap_or(canonical);
    format!("/{}", rel.to_string_lossy().trim_start_matches('/'))
}

/// Find the installed package whose manifest contains an exact line match
/// for `manifest_path`.
fn owning_package(config: &Config, manifest_path: &str) -> Option<String> {
    for name in installed_db::installed_names(config) {
        let manifest = installed_db::manifest_path(config, &name);
        let Ok(text) = fs::read_to_string(&manifest) else {
            continue;
        };
        if text.lines().any(|line| line == manifest_path) {
            return Some(name);
        }
    }
    None
}

/// Run the fix-dependencies stage for `pkg_name`. `stage_tree` is the staged
/// package tree (`<stage_root>/<name>/`), `depends_path` is the staged
/// `depends` file to append discovered owners to (sorted, deduplicated by
/// package name). Returns the package names newly recorded.
pub fn fixdeps_stage(config: &Config, pkg_name: &str, stage_tree: &Path, depends_path: &Path) -> Result<Vec<String>> {
    let mut existing = read_depends_raw(depends_path);
    let before: std::collections::BTreeSet<_> = existing.keys().cloned().collect();

    for entry in WalkDir::new(stage_tree).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if elf::classify(path).is_none() {
            continue;
        }

        for lib in elf::needed_libraries(path) {
            if TOOLCHAIN_BLOCKLIST.contains(&lib.as_str()) {
                continue;
            }
            let Some(canonical) = resolve_library(&config.target_root, &lib) else {
                continue;
            };
            let manifest_path = to_manifest_path(&config.target_root, &canonical);
            let Some(owner) = owning_package(config, &manifest_path) else {
                continue;
            };
            if owner == pkg_name {
                continue;
            }
            existing.entry(owner).or_insert(None);
        }
    }

    write_depends_raw(depends_path, &existing)?;

    let added: Vec<String> = existing.keys().filter(|k| !before.contains(*k)).cloned().collect();
    Ok(added)
}

/// Parse a `depends` file preserving each entry's raw kind token (`make` or
/// none), keyed by package name, sorted by the map's natural `BTreeMap`
/// ordering (which is what "sort-unique by first column" means here).
fn read_depends_raw(path: &Path) -> BTreeMap<String, Option<String>> {
    let mut map = BTreeMap::new();
    let Ok(text) = fs::read_to_string(path) else {
        return map;
    };
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let kind = parts.next().map(|s| s.to_string());
        map.insert(name.to_string(), kind);
    }
    map
}

fn write_depends_raw(path: &Path, map: &BTreeMap<String, Option<String>>) -> Result<()> {
    let mut out = String::new();
    for (name, kind) in map {
        match kind {
            Some(k) => out.push_str(&format!("{name} {k}\n")),
            None => out.push_str(&format!("{name}\n")),
        }
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn preserves_existing_and_sorts_unique() {
        let dir = tempdir().unwrap();
        let depends = dir.path().join("depends");
        fs::write(&depends, "zlib\nmusl make\n").unwrap();

        let map = read_depends_raw(&depends);
        assert_eq!(map.get("zlib"), Some(&None));
        assert_eq!(map.get("musl"), Some(&Some("make".to_string())));

        write_depends_raw(&depends, &map).unwrap();
        let text = fs::read_to_string(&depends).unwrap();
        // BTreeMap orders keys lexically: "musl" before "zlib".
        assert_eq!(text, "musl make\nzlib\n");
    }

    #[test]
    fn fixdeps_on_stage_with_no_elf_is_a_no_op() {
        let target_root = tempdir().unwrap();
        let stage = tempdir().unwrap();
        fs::write(stage.path().join("readme"), "not elf").unwrap();

        let config = Config {
            search_path: Vec::new(),
            target_root: target_root.path().to_path_buf(),
            cache_dir: PathBuf::from("/tmp"),
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "t".into(),
            junk_prune: Vec::new(),
        };

        let depends = stage.path().join("depends");
        let added = fixdeps_stage(&config, "pkg", stage.path(), &depends).unwrap();
        assert!(added.is_empty());
    }
}
