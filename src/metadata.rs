//! Package definition metadata: `version`, `sources`, `depends`, `checksums`,
//! and the marker files `nostrip`/`nodepends`.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRelease {
    pub version: String,
    pub release: String,
}

impl VersionRelease {
    pub fn tag(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependKind {
    Run,
    Make,
}

/// `read_version`: the first whitespace-separated token pair of `version`.
/// Fails if the release field is empty.
pub fn read_version(def_dir: &Path) -> Result<VersionRelease> {
    let text = fs::read_to_string(def_dir.join("version"))?;
    let first_line = text.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let version = parts.next().unwrap_or("").to_string();
    let release = parts.next().unwrap_or("").to_string();

    if version.is_empty() || release.is_empty() {
        return Err(Error::InvalidPackage { path: def_dir.to_path_buf() });
    }

    Ok(VersionRelease { version, release })
}

/// `read_sources`: each non-blank, non-comment line split on whitespace;
/// missing `dest` is the empty string.
pub fn read_sources(def_dir: &Path) -> Result<Vec<(String, String)>> {
    let path = def_dir.join("sources");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let src = parts.next().unwrap_or("").to_string();
        let dest = parts.next().unwrap_or("").to_string();
        out.push((src, dest));
    }
    Ok(out)
}

/// `read_depends`: lines `<pkg> [make]`; `#`-prefixed lines skipped. Missing
/// or unreadable `depends` is treated as no dependencies, not an error.
pub fn read_depends(def_dir: &Path) -> Vec<(String, DependKind)> {
    let path = def_dir.join("depends");
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let name = match parts.next() {
            Some(n) => n.to_string(),
            None => continue,
        };
        let kind = match parts.next() {
            Some("make") => DependKind::Make,
            _ => DependKind::Run,
        };
        out.push((name, kind));
    }
    out
}

/// `read_checksums`: one SHA-256 hex digest per line, same order as `sources`.
pub fn read_checksums(def_dir: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(def_dir.join("checksums"))?;
    Ok(text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}

pub fn has_marker(def_dir: &Path, marker: &str) -> bool {
    def_dir.join(marker).exists()
}

pub fn is_url(src: &str) -> bool {
    src.contains("://")
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match fs::metadata(path) {
            Ok(meta) => meta.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        path.exists()
    }
}

/// `lint`: asserts `sources` exists, `build` exists and is executable,
/// `version` exists and is non-empty with a non-empty release field.
pub fn lint(def_dir: &Path) -> Result<()> {
    if !def_dir.join("sources").exists() {
        return Err(Error::InvalidPackage { path: def_dir.to_path_buf() });
    }
    let build = def_dir.join("build");
    if !build.exists() || !is_executable(&build) {
        return Err(Error::InvalidPackage { path: def_dir.to_path_buf() });
    }
    read_version(def_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn parses_version_and_release() {
        let dir = tempdir().unwrap();
        write(dir.path(), "version", "1.2.3 1\n");
        let vr = read_version(dir.path()).unwrap();
        assert_eq!(vr.version, "1.2.3");
        assert_eq!(vr.release, "1");
        assert_eq!(vr.tag(), "1.2.3-1");
    }

    #[test]
    fn empty_release_is_invalid() {
        let dir = tempdir().unwrap();
        write(dir.path(), "version", "1.2.3\n");
        assert!(read_version(dir.path()).is_err());
    }

    #[test]
    fn sources_skip_blank_and_comment_lines() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "sources",
            "# comment\n\nhttps://ex/a.tar.gz\nlocal.patch build\n",
        );
        let sources = read_sources(dir.path()).unwrap();
        assert_eq!(sources, vec![
            ("https://ex/a.tar.gz".to_string(), String::new()),
            ("local.patch".to_string(), "build".to_string()),
        ]);
    }

    #[test]
    fn depends_missing_file_is_empty_not_error() {
        let dir = tempdir().unwrap();
        assert!(read_depends(dir.path()).is_empty());
    }

    #[test]
    fn depends_parses_kind() {
        let dir = tempdir().unwrap();
        write(dir.path(), "depends", "# comment\nmusl\ngcc make\n");
        let deps = read_depends(dir.path());
        assert_eq!(deps, vec![
            ("musl".to_string(), DependKind::Run),
            ("gcc".to_string(), DependKind::Make),
        ]);
    }

    #[test]
    fn lint_requires_executable_build() {
        let dir = tempdir().unwrap();
        write(dir.path(), "sources", "");
        write(dir.path(), "version", "1.0 1\n");
        write(dir.path(), "build", "#!/bin/sh\n");
        assert!(lint(dir.path()).is_err());

        let mut perms = fs::metadata(dir.path().join("build")).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(dir.path().join("build"), perms).unwrap();
        assert!(lint(dir.path()).is_ok());
    }
}
