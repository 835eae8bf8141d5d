//! Repository search-path lookup.
//!
//! A "repository" is just a directory whose immediate children are package
//! definitions, scanned directly off disk in search-path order with the
//! installed-db scanned last.

use std::path::{Path, PathBuf};

use crate::context::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    First,
    All,
}

/// `find(name, mode)`: first-wins per search-path order for `Mode::First`;
/// every hit for `Mode::All` (used by `search`).
pub fn find(config: &Config, name: &str, mode: Mode) -> Result<Vec<PathBuf>> {
    if config.search_path.is_empty() {
        return Err(Error::NoSearchPath);
    }
    let roots = all_roots(config);

    let mut hits = Vec::new();
    for root in &roots {
        let candidate = root.join(name);
        if candidate.is_dir() {
            hits.push(candidate);
            if mode == Mode::First {
                return Ok(hits);
            }
        }
    }

    if hits.is_empty() {
        return Err(Error::NotFound { name: name.to_string() });
    }
    Ok(hits)
}

/// The search path plus the installed-db root, which is always scanned last.
pub fn all_roots(config: &Config) -> Vec<PathBuf> {
    let mut roots = config.search_path.clone();
    roots.push(config.installed_db_root());
    roots
}

/// Enumerate every package definition visible anywhere in the search path
/// (for `search`/`list`-style wildcard expansion), in OS enumeration order
/// per root, root order as declared.
pub fn enumerate_all(config: &Config) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    for root in all_roots(config) {
        let Ok(entries) = std::fs::read_dir(&root) else {
            continue;
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    out.push((name.to_string(), entry.path()));
                }
            }
        }
    }
    out
}

/// `search`: shell-style wildcard match against every package name visible in
/// the search path (and the installed-db), deduplicated by first occurrence
/// per the same first-wins rule as `find`.
pub fn search(config: &Config, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    let glob_pattern = glob::Pattern::new(pattern).map_err(|_| Error::InvalidName { name: pattern.to_string() })?;

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (name, path) in enumerate_all(config) {
        if seen.contains(&name) {
            continue;
        }
        if glob_pattern.matches(&name) {
            seen.insert(name.clone());
            out.push((name, path));
        }
    }
    Ok(out)
}

pub fn is_repo_root(path: &Path) -> bool {
    path.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cfg_with_roots(roots: Vec<PathBuf>) -> Config {
        Config {
            search_path: roots,
            target_root: PathBuf::from("/nonexistent-root-for-tests"),
            cache_dir: PathBuf::from("/tmp"),
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "test".into(),
            junk_prune: Vec::new(),
        }
    }

    #[test]
    fn first_wins_across_repos() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        std::fs::create_dir(a.path().join("gcc")).unwrap();
        std::fs::create_dir(b.path().join("gcc")).unwrap();

        let cfg = cfg_with_roots(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        let hits = find(&cfg, "gcc", Mode::First).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], a.path().join("gcc"));
    }

    #[test]
    fn not_found_errors() {
        let a = tempdir().unwrap();
        let cfg = cfg_with_roots(vec![a.path().to_path_buf()]);
        assert!(matches!(find(&cfg, "missing", Mode::First), Err(Error::NotFound { .. })));
    }

    #[test]
    fn no_search_path_errors() {
        let cfg = cfg_with_roots(vec![]);
        assert!(matches!(find(&cfg, "gcc", Mode::First), Err(Error::NoSearchPath)));
    }

    #[test]
    fn search_matches_wildcard_and_dedups() {
        let a = tempdir().unwrap();
        std::fs::create_dir(a.path().join("gcc")).unwrap();
        std::fs::create_dir(a.path().join("gdb")).unwrap();
        std::fs::create_dir(a.path().join("python3")).unwrap();

        let cfg = cfg_with_roots(vec![a.path().to_path_buf()]);
        let mut hits = search(&cfg, "g*").unwrap();
        hits.sort();
        let names: Vec<_> = hits.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["gcc", "gdb"]);
    }
}
