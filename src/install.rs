//! Install procedure: conflict detection, staged extraction,
//! dependency gate, incremental rsync-style copy into the target root, and
//! leftover pruning on upgrade.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::{join_root, Context, INSTALLED_DB_PATH};
use crate::error::{Error, Result};
use crate::manifest;
use crate::metadata::{self, DependKind};
use crate::reporter::Event;
use crate::scratch::Scratch;
use crate::signal_guard::CriticalSection;

/// Self-executables that leftover-pruning never deletes, even when a path
/// under them is no longer listed in the new manifest.
const CRITICAL_EXECUTABLES: &[&str] = &["/usr/bin/kpkg", "/bin/sh", "/bin/cp"];

#[derive(Debug, Clone)]
pub enum InstallSource {
    /// A `.tar.gz` path given directly on the command line.
    Tarball(PathBuf),
    /// A bare package name: resolved to `<bin_cache>/<name>#<version>-<release>.tar.gz`.
    Name(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub force: bool,
}

/// Install a package from a tarball or by name, returning the installed
/// package's name.
pub fn install(ctx: &mut Context, source: &InstallSource, opts: InstallOptions) -> Result<String> {
    let tarball = resolve_tarball_path(ctx, source)?;

    let scratch = Scratch::create(&ctx.config)?;
    let extract_dir = scratch.extract_root.join(format!("install-{}", extract_key(&tarball)));
    crate::archive::extract_full("install", &tarball, &extract_dir)?;

    let name = identify_package_name(&extract_dir)?;
    let entry_dir = extract_dir.join(INSTALLED_DB_PATH).join(&name);

    let new_manifest = manifest::read(&entry_dir.join("manifest"))?;
    conflict_check(ctx, &name, &new_manifest)?;

    if !opts.force {
        dependency_gate(ctx, &entry_dir)?;
    }

    let old_manifest_path = crate::installed_db::manifest_path(&ctx.config, &name);
    let old_manifest = manifest::read(&old_manifest_path).ok();

    {
        let _guard = CriticalSection::enter();
        mirror_tree(&extract_dir, &ctx.config.target_root, |rel| !under_etc(rel), true)?;
        mirror_tree(&extract_dir, &ctx.config.target_root, under_etc, false)?;

        if let Some(old) = &old_manifest {
            let leftover = manifest::leftover(old, &new_manifest);
            prune_leftover(&ctx.config.target_root, &leftover);
        }

        // Re-run the mirror step twice more to restore any path whose
        // removal in the leftover pass collided with a shared inode also
        // present in the new manifest.
        for _ in 0..2 {
            mirror_tree(&extract_dir, &ctx.config.target_root, |rel| !under_etc(rel), true)?;
            mirror_tree(&extract_dir, &ctx.config.target_root, under_etc, false)?;
        }
    }

    run_post_install(ctx, &name, &entry_dir);
    ctx.reporter.report(Event::PackageInstalled { name: name.clone() });
    Ok(name)
}

fn extract_key(tarball: &Path) -> String {
    tarball
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "pkg".to_string())
}

fn resolve_tarball_path(ctx: &Context, source: &InstallSource) -> Result<PathBuf> {
    match source {
        InstallSource::Tarball(path) => Ok(path.clone()),
        InstallSource::Name(name) => {
            crate::name::validate(name)?;
            let hits = crate::repo::find(&ctx.config, name, crate::repo::Mode::First)?;
            let def_dir = hits.first().ok_or_else(|| Error::NotFound { name: name.clone() })?;
            let vr = metadata::read_version(def_dir)?;
            let tarball = ctx.config.bin_cache().join(format!("{name}#{}.tar.gz", vr.tag()));
            if !tarball.exists() {
                return Err(Error::NotBuilt { name: name.clone() });
            }
            Ok(tarball)
        }
    }
}

/// Find the single `<installed-db-path>/<name>/version` entry in the
/// extracted tree and return `<name>`.
fn identify_package_name(extract_dir: &Path) -> Result<String> {
    let db_root = extract_dir.join(INSTALLED_DB_PATH);
    let Ok(entries) = fs::read_dir(&db_root) else {
        return Err(Error::InvalidPackage { path: extract_dir.to_path_buf() });
    };
    for entry in entries.flatten() {
        if entry.path().join("version").is_file() {
            return Ok(entry.file_name().to_string_lossy().to_string());
        }
    }
    Err(Error::InvalidPackage { path: extract_dir.to_path_buf() })
}

/// Every listed path, plus its symlink-resolved canonical form under the
/// target root where that differs, so a conflict routed through an existing
/// symlink (e.g. `/lib` -> `/usr/lib`) is still caught.
fn expand_with_symlink_targets(target_root: &Path, entries: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(entries.len() * 2);
    for path in entries {
        out.push(path.clone());
        let on_disk = join_root(target_root, path);
        if let Ok(canonical) = fs::canonicalize(&on_disk) {
            let rel = canonical.strip_prefix(target_root).unwrap_or(&canonical);
            let mut resolved = format!("/{}", rel.to_string_lossy().trim_start_matches('/'));
            if path.ends_with('/') && !resolved.ends_with('/') {
                resolved.push('/');
            }
            if resolved != *path {
                out.push(resolved);
            }
        }
    }
    out
}

fn conflict_check(ctx: &Context, name: &str, new_manifest: &[String]) -> Result<()> {
    let expanded = expand_with_symlink_targets(&ctx.config.target_root, new_manifest);
    let candidates: HashSet<&str> = expanded.iter().map(String::as_str).collect();

    for other in crate::installed_db::installed_names(&ctx.config) {
        if other == name {
            continue;
        }
        let Ok(text) = fs::read_to_string(crate::installed_db::manifest_path(&ctx.config, &other)) else {
            continue;
        };
        for line in text.lines() {
            if candidates.contains(line) {
                return Err(Error::Conflict { path: line.to_string(), owner: other });
            }
        }
    }
    Ok(())
}

fn dependency_gate(ctx: &Context, entry_dir: &Path) -> Result<()> {
    let missing: Vec<String> = metadata::read_depends(entry_dir)
        .into_iter()
        .filter(|(_, kind)| *kind == DependKind::Run)
        .map(|(dep, _)| dep)
        .filter(|dep| !crate::installed_db::is_installed(&ctx.config, dep))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingDeps {
            name: entry_dir.file_name().unwrap_or_default().to_string_lossy().to_string(),
            missing,
        })
    }
}

fn under_etc(rel: &Path) -> bool {
    rel.components().next().is_some_and(|c| c.as_os_str() == "etc")
}

/// Mirror every path under `src_root` matching `filter` into `target_root`,
/// preserving permissions, ownership, hard links and extended attributes.
/// `overwrite = false` means ignore-existing (never replaces a file already
/// on disk, the `/etc` semantics).
fn mirror_tree(src_root: &Path, target_root: &Path, filter: impl Fn(&Path) -> bool, overwrite: bool) -> Result<()> {
    // Maps a source inode already copied during this pass to the dest path
    // it landed at, so a second manifest path sharing that inode becomes a
    // hard link instead of an independent copy.
    let mut hardlinks: HashMap<u64, PathBuf> = HashMap::new();

    for entry in WalkDir::new(src_root).into_iter().filter_map(|e| e.ok()) {
        let rel = entry.path().strip_prefix(src_root).unwrap_or(entry.path());
        if rel.as_os_str().is_empty() || !filter(rel) {
            continue;
        }
        let dest = target_root.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.path_is_symlink() {
            if dest.symlink_metadata().is_ok() {
                if !overwrite {
                    continue;
                }
                let _ = fs::remove_file(&dest);
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let link_target = fs::read_link(entry.path())?;
            symlink(entry.path(), &link_target, &dest)?;
        } else {
            if dest.exists() && !overwrite {
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let _ = fs::remove_file(&dest);

            if let Some(existing) = linked_source(entry.path(), &mut hardlinks, &dest) {
                fs::hard_link(existing, &dest)?;
                continue;
            }
            copy_regular_file(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// On a repeat inode (`nlink() > 1` and already seen this pass), returns the
/// dest path it was first copied to. Otherwise records `dest` against the
/// source inode and returns `None` so the caller performs a real copy.
#[cfg(unix)]
fn linked_source(src: &Path, hardlinks: &mut HashMap<u64, PathBuf>, dest: &Path) -> Option<PathBuf> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::metadata(src).ok()?;
    if meta.nlink() <= 1 {
        return None;
    }
    match hardlinks.get(&meta.ino()) {
        Some(existing) => Some(existing.clone()),
        None => {
            hardlinks.insert(meta.ino(), dest.to_path_buf());
            None
        }
    }
}

#[cfg(not(unix))]
fn linked_source(_src: &Path, _hardlinks: &mut HashMap<u64, PathBuf>, _dest: &Path) -> Option<PathBuf> {
    None
}

/// Copy a regular file, then restore the owner/group and extended
/// attributes `fs::copy` doesn't carry over. Ownership and xattr failures
/// are tolerated (an unprivileged invocation can't `chown`) since the file
/// content itself is already correct.
#[cfg(unix)]
fn copy_regular_file(src: &Path, dest: &Path) -> Result<()> {
    use std::os::unix::fs::{chown, MetadataExt};

    fs::copy(src, dest)?;

    if let Ok(meta) = fs::metadata(src) {
        let _ = chown(dest, Some(meta.uid()), Some(meta.gid()));
    }
    if let Ok(names) = xattr::list(src) {
        for name in names {
            if let Ok(Some(value)) = xattr::get(src, &name) {
                let _ = xattr::set(dest, &name, &value);
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn copy_regular_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)?;
    Ok(())
}

#[cfg(unix)]
fn symlink(src: &Path, target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    std::os::unix::fs::symlink(target, link)?;
    if let Ok(meta) = fs::symlink_metadata(src) {
        let _ = std::os::unix::fs::lchown(link, Some(meta.uid()), Some(meta.gid()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn symlink(_src: &Path, _target: &Path, _link: &Path) -> Result<()> {
    Ok(())
}

fn prune_leftover(target_root: &Path, leftover: &[String]) {
    for path in leftover {
        if manifest::is_under_etc(path) || CRITICAL_EXECUTABLES.contains(&path.as_str()) {
            continue;
        }
        let target = join_root(target_root, path);
        if path.ends_with('/') {
            let _ = fs::remove_dir(&target);
        } else {
            let _ = fs::remove_file(&target);
        }
    }
}

fn run_post_install(ctx: &mut Context, name: &str, entry_dir: &Path) {
    let script = entry_dir.join("post-install");
    if !script.exists() {
        return;
    }
    match ctx.post_install_runner.run(&script, entry_dir) {
        Ok(status) if !status.success() => {
            ctx.reporter.report(Event::Warning {
                name: Some(name.to_string()),
                message: format!("post-install exited with {status}"),
            });
        }
        Err(e) => {
            ctx.reporter.report(Event::Warning {
                name: Some(name.to_string()),
                message: format!("post-install failed to run: {e}"),
            });
        }
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::process::{FakeBuildRunner, FakeDownloader, FakePostInstallRunner};
    use tempfile::tempdir;

    fn test_ctx(target_root: PathBuf, cache_dir: PathBuf) -> Context {
        let config = Config {
            search_path: Vec::new(),
            target_root,
            cache_dir,
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "install-test".into(),
            junk_prune: Vec::new(),
        };
        let mut ctx = Context::new(config);
        ctx.downloader = Box::new(FakeDownloader::default());
        ctx.build_runner = Box::new(FakeBuildRunner);
        ctx.post_install_runner = Box::new(FakePostInstallRunner);
        ctx
    }

    fn write_stage_tarball(cache: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let stage = tempdir().unwrap();
        fs::create_dir_all(stage.path().join(INSTALLED_DB_PATH).join(name)).unwrap();
        fs::write(stage.path().join(INSTALLED_DB_PATH).join(name).join("version"), "1.0 1\n").unwrap();
        for (rel, content) in files {
            let dest = stage.path().join(rel);
            fs::create_dir_all(dest.parent().unwrap()).unwrap();
            fs::write(&dest, content).unwrap();
        }
        let entries = manifest::build(stage.path());
        manifest::write(&stage.path().join(INSTALLED_DB_PATH).join(name).join("manifest"), &entries).unwrap();

        let tarball = cache.join(format!("{name}#1.0-1.tar.gz"));
        crate::archive::create_tarball(stage.path(), &tarball).unwrap();
        tarball
    }

    #[test]
    fn fresh_install_populates_target_root() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let tarball = write_stage_tarball(cache.path(), "a", &[("usr/bin/a", b"bin")]);

        let mut ctx = test_ctx(target.path().to_path_buf(), cache.path().to_path_buf());
        let name = install(&mut ctx, &InstallSource::Tarball(tarball), InstallOptions::default()).unwrap();
        assert_eq!(name, "a");
        assert!(target.path().join("usr/bin/a").exists());
        assert!(crate::installed_db::is_installed(&ctx.config, "a"));
    }

    #[test]
    fn conflict_aborts_before_mutating_target_root() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();

        let tarball_a = write_stage_tarball(cache.path(), "a", &[("usr/bin/shared", b"a")]);
        let mut ctx = test_ctx(target.path().to_path_buf(), cache.path().to_path_buf());
        install(&mut ctx, &InstallSource::Tarball(tarball_a), InstallOptions::default()).unwrap();

        let tarball_b = write_stage_tarball(cache.path(), "b", &[("usr/bin/shared", b"b")]);
        let err = install(&mut ctx, &InstallSource::Tarball(tarball_b), InstallOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(!crate::installed_db::is_installed(&ctx.config, "b"));
    }

    #[test]
    fn etc_files_are_never_overwritten() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        fs::create_dir_all(target.path().join("etc")).unwrap();
        fs::write(target.path().join("etc/conf"), b"user-edited").unwrap();

        let tarball = write_stage_tarball(cache.path(), "a", &[("etc/conf", b"default")]);
        let mut ctx = test_ctx(target.path().to_path_buf(), cache.path().to_path_buf());
        install(&mut ctx, &InstallSource::Tarball(tarball), InstallOptions::default()).unwrap();

        assert_eq!(fs::read(target.path().join("etc/conf")).unwrap(), b"user-edited");
    }

    #[test]
    fn upgrade_prunes_leftover_and_preserves_etc() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        fs::create_dir_all(target.path().join("etc")).unwrap();
        fs::write(target.path().join("etc/x.conf"), b"user-edited").unwrap();

        let mut ctx = test_ctx(target.path().to_path_buf(), cache.path().to_path_buf());

        let v1 = write_stage_tarball(cache.path(), "a", &[("usr/bin/x", b"old"), ("usr/share/x/old", b"old")]);
        install(&mut ctx, &InstallSource::Tarball(v1), InstallOptions::default()).unwrap();
        assert!(target.path().join("usr/share/x/old").exists());

        let v2 = write_stage_tarball(cache.path(), "a", &[("usr/bin/x", b"new"), ("usr/share/x/new", b"new")]);
        install(&mut ctx, &InstallSource::Tarball(v2), InstallOptions::default()).unwrap();

        assert_eq!(fs::read(target.path().join("usr/bin/x")).unwrap(), b"new");
        assert!(target.path().join("usr/share/x/new").exists());
        assert!(!target.path().join("usr/share/x/old").exists());
        assert_eq!(fs::read(target.path().join("etc/x.conf")).unwrap(), b"user-edited");
    }

    #[test]
    fn dependency_gate_blocks_missing_runtime_dep() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let stage = tempdir().unwrap();
        fs::create_dir_all(stage.path().join(INSTALLED_DB_PATH).join("a")).unwrap();
        fs::write(stage.path().join(INSTALLED_DB_PATH).join("a/version"), "1.0 1\n").unwrap();
        fs::write(stage.path().join(INSTALLED_DB_PATH).join("a/depends"), "libfoo\n").unwrap();
        let entries = manifest::build(stage.path());
        manifest::write(&stage.path().join(INSTALLED_DB_PATH).join("a/manifest"), &entries).unwrap();
        let tarball = cache.path().join("a#1.0-1.tar.gz");
        crate::archive::create_tarball(stage.path(), &tarball).unwrap();

        let mut ctx = test_ctx(target.path().to_path_buf(), cache.path().to_path_buf());
        let err = install(&mut ctx, &InstallSource::Tarball(tarball), InstallOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingDeps { .. }));
    }
}
