//! Installed-package database: read/list/register/unregister entries under
//! the installed-db root. There is no serialized blob: the installed-db
//! root directory itself *is* the database.

use std::path::PathBuf;

use crate::context::Config;
use crate::error::{Error, Result};
use crate::metadata::{self, VersionRelease};

/// `list_installed(None)` enumerates every subdirectory of the installed-db
/// root; `list_installed(Some(names))` verifies each is present and fails
/// with `NotInstalled` on the first missing one.
pub fn list_installed(config: &Config, names: Option<&[String]>) -> Result<Vec<(String, VersionRelease)>> {
    let root = config.installed_db_root();

    match names {
        None => {
            let mut out = Vec::new();
            let Ok(entries) = std::fs::read_dir(&root) else {
                return Ok(out);
            };
            let mut dirs: Vec<_> = entries.flatten().filter(|e| e.path().is_dir()).collect();
            dirs.sort_by_key(|e| e.file_name());
            for entry in dirs {
                let name = entry.file_name().to_string_lossy().to_string();
                let vr = metadata::read_version(&entry.path())?;
                out.push((name, vr));
            }
            Ok(out)
        }
        Some(names) => {
            let mut out = Vec::new();
            for name in names {
                let path = root.join(name);
                if !path.is_dir() {
                    return Err(Error::NotInstalled { name: name.clone() });
                }
                let vr = metadata::read_version(&path)?;
                out.push((name.clone(), vr));
            }
            Ok(out)
        }
    }
}

pub fn is_installed(config: &Config, name: &str) -> bool {
    config.installed_db_root().join(name).is_dir()
}

pub fn entry_path(config: &Config, name: &str) -> PathBuf {
    config.installed_db_root().join(name)
}

pub fn manifest_path(config: &Config, name: &str) -> PathBuf {
    entry_path(config, name).join("manifest")
}

/// All installed package names, for reverse-dependency and fixdeps scans.
pub fn installed_names(config: &Config) -> Vec<String> {
    list_installed(config, None)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cfg(target_root: PathBuf) -> Config {
        Config {
            search_path: Vec::new(),
            target_root,
            cache_dir: PathBuf::from("/tmp"),
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "test".into(),
            junk_prune: Vec::new(),
        }
    }

    fn install_stub(config: &Config, name: &str, version: &str, release: &str) {
        let dir = entry_path(config, name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("version"), format!("{version} {release}\n")).unwrap();
    }

    #[test]
    fn list_all_enumerates_subdirs() {
        let root = tempdir().unwrap();
        let cfg = cfg(root.path().to_path_buf());
        install_stub(&cfg, "a", "1.0", "1");
        install_stub(&cfg, "b", "2.0", "1");

        let mut all = list_installed(&cfg, None).unwrap();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "a");
    }

    #[test]
    fn list_named_fails_on_missing() {
        let root = tempdir().unwrap();
        let cfg = cfg(root.path().to_path_buf());
        install_stub(&cfg, "a", "1.0", "1");

        assert!(list_installed(&cfg, Some(&["a".to_string()])).is_ok());
        assert!(matches!(
            list_installed(&cfg, Some(&["missing".to_string()])),
            Err(Error::NotInstalled { .. })
        ));
    }
}
