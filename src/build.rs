//! Build pipeline and build driver.
//!
//! One package's stage is fully independent of any other; the pipeline
//! below runs sequentially, one package at a time (no parallel builds
//! within a single invocation).

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::context::{Context, INSTALLED_DB_PATH};
use crate::error::{Error, Result};
use crate::fixdeps;
use crate::junk;
use crate::manifest;
use crate::metadata;
use crate::repo::{self, Mode};
use crate::reporter::Event;
use crate::resolver::{self, ResolveMode};
use crate::scratch::Scratch;
use crate::source_cache;
use crate::strip::{self, RealStripper};

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Set by the update procedure: forces every package built in this
    /// invocation to install immediately after its own build, even if it
    /// was named explicitly by the user.
    pub update: bool,
}

/// Run the build pipeline for every package resolved from `roots`, in
/// dependency order.
pub fn build(ctx: &mut Context, roots: &[String], opts: BuildOptions) -> Result<Vec<String>> {
    for name in roots {
        crate::name::validate(name)?;
    }

    let resolved = resolver::resolve(&ctx.config, roots, ResolveMode::Build)?;
    let explicit: std::collections::HashSet<&str> = resolved.explicit.iter().map(String::as_str).collect();

    // Definitions for every package in the order, resolved once.
    let mut def_dirs = Vec::new();
    for name in &resolved.order {
        let hits = repo::find(&ctx.config, name, Mode::First)?;
        def_dirs.push((name.clone(), hits.into_iter().next().ok_or_else(|| Error::NotFound { name: name.clone() })?));
    }

    // All linting precedes all fetching.
    for (name, def_dir) in &def_dirs {
        metadata::lint(def_dir)?;
        ctx.reporter.report(Event::PackageLintOk { name: name.clone() });
    }

    // All fetching precedes all checksum verification.
    let mut missing_checksums = Vec::new();
    for (name, def_dir) in &def_dirs {
        if !def_dir.join("checksums").exists() {
            missing_checksums.push(name.clone());
        }
    }
    if !missing_checksums.is_empty() {
        return Err(Error::MissingChecksums { names: missing_checksums });
    }

    for (name, def_dir) in &def_dirs {
        source_cache::fetch(ctx, name, def_dir)?;
    }

    // All verification precedes any build step.
    let mut mismatched = Vec::new();
    for (name, def_dir) in &def_dirs {
        if source_cache::verify(&ctx.config, name, def_dir).is_err() {
            mismatched.push(name.clone());
        }
    }
    if !mismatched.is_empty() {
        return Err(Error::ChecksumMismatch { names: mismatched });
    }
    for (name, _) in &def_dirs {
        ctx.reporter.report(Event::PackageChecksumOk { name: name.clone() });
    }

    let scratch = Scratch::create(&ctx.config)?;
    let stripper = RealStripper;
    let mut built = Vec::new();

    for (name, def_dir) in &def_dirs {
        let vr = metadata::read_version(def_dir)?;
        let tarball = ctx.config.bin_cache().join(format!("{name}#{}.tar.gz", vr.tag()));

        if tarball.exists() && !explicit.contains(name.as_str()) {
            // Pre-built tarball exists and this package wasn't user-specified:
            // install it, skipping the build.
            crate::install::install(ctx, &crate::install::InstallSource::Tarball(tarball), crate::install::InstallOptions::default())?;
            built.push(name.clone());
            continue;
        }

        run_pipeline(ctx, &scratch, name, def_dir, &vr)?;
        built.push(name.clone());

        let is_dependency_of_explicit = !explicit.contains(name.as_str());
        if is_dependency_of_explicit || opts.update {
            let tarball = ctx.config.bin_cache().join(format!("{name}#{}.tar.gz", vr.tag()));
            crate::install::install(ctx, &crate::install::InstallSource::Tarball(tarball), crate::install::InstallOptions::default())?;
        }
    }

    ctx.reporter.report(Event::BatchSummary { succeeded: built.clone(), failed: Vec::new() });
    Ok(built)
}

fn run_pipeline(ctx: &mut Context, scratch: &Scratch, name: &str, def_dir: &Path, vr: &metadata::VersionRelease) -> Result<()> {
    ctx.reporter.report(Event::PackageBuildStarted { name: name.to_string() });

    // 1. Extract.
    let build_dir = scratch.package_build_dir(name);
    fs::create_dir_all(&build_dir)?;
    for (src, dest) in metadata::read_sources(def_dir)? {
        let dest_dir = build_dir.join(&dest);
        let source_path = source_cache::resolved_path(&ctx.config, name, def_dir, &src);
        let filename = source_cache::basename(&src);

        if archive::is_tar_archive(filename) {
            archive::extract_stripped(name, &source_path, &dest_dir)?;
        } else {
            archive::copy_verbatim(&source_path, &dest_dir)?;
        }
    }

    // 2. Invoke build.
    let stage_dir = scratch.package_stage_dir(name);
    fs::create_dir_all(&stage_dir)?;
    let build_script = def_dir.join("build");
    let status = ctx
        .build_runner
        .run(&build_script, &stage_dir, &build_dir, ctx.config.build_log_sink.as_deref())?;
    if !status.success() {
        return Err(Error::BuildFailed { name: name.to_string(), code: status.code() });
    }
    ctx.reporter.report(Event::PackageBuildFinished { name: name.to_string() });

    // 3. Copy definition into the installed-db entry the stage will become.
    let entry_dir = stage_dir.join(INSTALLED_DB_PATH).join(name);
    copy_dir_all(def_dir, &entry_dir)?;

    // 4. Strip, unless nostrip.
    if !metadata::has_marker(def_dir, "nostrip") {
        let report = strip::strip_stage(&stripper, &stage_dir)?;
        for (path, reason) in &report.warnings {
            ctx.reporter.report(Event::Warning { name: Some(name.to_string()), message: format!("{path}: strip failed: {reason}") });
        }
        ctx.reporter.report(Event::PackageStripped { name: name.to_string(), files: report.stripped });
    }

    // 5. Fix-dependencies, unless nodepends.
    if !metadata::has_marker(def_dir, "nodepends") {
        let depends_path = entry_dir.join("depends");
        let added = fixdeps::fixdeps_stage(&ctx.config, name, &stage_dir, &depends_path)?;
        if !added.is_empty() {
            ctx.reporter.report(Event::PackageFixdepsFinished { name: name.to_string(), added });
        }
    }

    // 6. Junk prune.
    junk::prune(&stage_dir, &ctx.config.junk_prune)?;

    // 7. Manifest (touch first so the manifest lists itself).
    let manifest_path = entry_dir.join("manifest");
    fs::write(&manifest_path, "")?;
    let entries = manifest::build(&stage_dir);
    manifest::write(&manifest_path, &entries)?;

    // 8. Tar.
    let tarball = ctx.config.bin_cache().join(format!("{name}#{}.tar.gz", vr.tag()));
    archive::create_tarball(&stage_dir, &tarball)?;
    ctx.reporter.report(Event::PackageTarred { name: name.to_string(), path: tarball.display().to_string() });

    Ok(())
}

fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::process::{FakeBuildRunner, FakeDownloader, FakePostInstallRunner};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn make_repo_pkg(repo: &Path, name: &str, deps: &[&str]) {
        let dir = repo.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("version"), "1.0 1\n").unwrap();
        fs::write(dir.join("sources"), "").unwrap();
        fs::write(dir.join("checksums"), "").unwrap();
        let build = dir.join("build");
        fs::write(&build, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = fs::metadata(&build).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&build, perms).unwrap();
        if !deps.is_empty() {
            fs::write(dir.join("depends"), deps.join("\n") + "\n").unwrap();
        }
    }

    fn test_ctx(repo_root: PathBuf, target_root: PathBuf, cache_dir: PathBuf) -> Context {
        let config = Config {
            search_path: vec![repo_root],
            target_root,
            cache_dir,
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "build-test".into(),
            junk_prune: Vec::new(),
        };
        let mut ctx = Context::new(config);
        ctx.downloader = Box::new(FakeDownloader::default());
        ctx.build_runner = Box::new(FakeBuildRunner);
        ctx.post_install_runner = Box::new(FakePostInstallRunner);
        ctx
    }

    #[test]
    fn s1_linear_chain_builds_in_order_and_installs() {
        let repo = tempdir().unwrap();
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();

        make_repo_pkg(repo.path(), "c", &[]);
        make_repo_pkg(repo.path(), "b", &["c"]);
        make_repo_pkg(repo.path(), "a", &["b"]);

        let mut ctx = test_ctx(repo.path().to_path_buf(), target.path().to_path_buf(), cache.path().to_path_buf());
        let built = build(&mut ctx, &["a".to_string()], BuildOptions::default()).unwrap();
        assert_eq!(built, vec!["c", "b", "a"]);

        // c and b are dependencies of the explicit root a, so the build
        // driver installs them immediately; a itself stays built-but-not
        // installed until a separate `install a`.
        for name in ["b", "c"] {
            assert!(crate::installed_db::is_installed(&ctx.config, name), "{name} should be installed");
        }
        assert!(!crate::installed_db::is_installed(&ctx.config, "a"));

        for name in ["a", "b", "c"] {
            let tarball_dir = ctx.config.bin_cache();
            assert!(fs::read_dir(&tarball_dir).unwrap().any(|e| e.unwrap().file_name().to_string_lossy().starts_with(&format!("{name}#"))));
        }
    }

    #[test]
    fn missing_checksums_file_aborts_before_build() {
        let repo = tempdir().unwrap();
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        make_repo_pkg(repo.path(), "a", &[]);
        fs::remove_file(repo.path().join("a/checksums")).unwrap();

        let mut ctx = test_ctx(repo.path().to_path_buf(), target.path().to_path_buf(), cache.path().to_path_buf());
        let err = build(&mut ctx, &["a".to_string()], BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingChecksums { .. }));
    }

    #[test]
    fn checksum_mismatch_aborts_before_build_script_runs() {
        let repo = tempdir().unwrap();
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        make_repo_pkg(repo.path(), "a", &[]);
        fs::write(repo.path().join("a/sources"), "local.tar\n").unwrap();
        fs::write(repo.path().join("a/local.tar"), b"bytes").unwrap();
        fs::write(repo.path().join("a/checksums"), "0000000000000000000000000000000000000000000000000000000000000000\n").unwrap();

        let mut ctx = test_ctx(repo.path().to_path_buf(), target.path().to_path_buf(), cache.path().to_path_buf());
        let err = build(&mut ctx, &["a".to_string()], BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(!crate::installed_db::is_installed(&ctx.config, "a"));
    }
}
