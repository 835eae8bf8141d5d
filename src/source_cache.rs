//! Source acquisition: fetch remote sources, verify presence of local
//! sources, and compute/verify their checksums.

use std::path::{Path, PathBuf};

use crate::checksum;
use crate::context::{Config, Context};
use crate::error::{Error, Result};
use crate::metadata::{self, is_url};

/// Basename of a source entry: the last path segment of a URL or local path.
pub fn basename(src: &str) -> &str {
    src.rsplit('/').next().unwrap_or(src)
}

/// Resolve where a source's bytes live on disk once fetched: the per-package
/// source-cache directory for URLs, or a path relative to the repository
/// definition for local sources.
pub fn resolved_path(config: &Config, name: &str, def_dir: &Path, src: &str) -> PathBuf {
    if is_url(src) {
        config.sources_cache(name).join(basename(src))
    } else {
        def_dir.join(src)
    }
}

/// `fetch(name)`: reuse an already-cached download, otherwise fetch it; local
/// sources just need to exist.
pub fn fetch(ctx: &Context, name: &str, def_dir: &Path) -> Result<()> {
    for (src, _dest) in metadata::read_sources(def_dir)? {
        let dest = resolved_path(&ctx.config, name, def_dir, &src);

        if is_url(&src) {
            if dest.exists() {
                ctx.reporter.report(crate::reporter::Event::PackageFetchCached {
                    name: name.to_string(),
                    file: basename(&src).to_string(),
                });
                continue;
            }
            ctx.downloader.fetch(&src, &dest).map_err(|e| match e {
                Error::DownloadFailed { reason, .. } => Error::DownloadFailed { name: name.to_string(), reason },
                other => other,
            })?;
            ctx.reporter.report(crate::reporter::Event::PackageFetchDownloaded {
                name: name.to_string(),
                file: basename(&src).to_string(),
            });
        } else if !dest.exists() {
            return Err(Error::DownloadFailed {
                name: name.to_string(),
                reason: format!("local source not found: {}", dest.display()),
            });
        }
    }
    Ok(())
}

/// `checksum(name)`: hash every already-fetched/local source, preserving
/// `sources` order.
pub fn checksum(config: &Config, name: &str, def_dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for (src, _dest) in metadata::read_sources(def_dir)? {
        let path = resolved_path(config, name, def_dir, &src);
        out.push(checksum::hash_file(&path)?);
    }
    Ok(out)
}

/// `verify(name)`: compare the computed checksum list against the stored
/// `checksums` file, byte-exact. Never auto-repaired.
pub fn verify(config: &Config, name: &str, def_dir: &Path) -> Result<()> {
    let stored = metadata::read_checksums(def_dir).map_err(|_| Error::MissingChecksums { names: vec![name.to_string()] })?;
    let computed = checksum(config, name, def_dir)?;
    if !checksum::lists_match(&computed, &stored) {
        return Err(Error::ChecksumMismatch { names: vec![name.to_string()] });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::process::FakeDownloader;
    use std::fs;
    use tempfile::tempdir;

    fn test_config(cache_dir: PathBuf) -> Config {
        Config {
            search_path: Vec::new(),
            target_root: PathBuf::from("/nonexistent"),
            cache_dir,
            force: false,
            debug: false,
            build_log_sink: None,
            process_key: "test".into(),
            junk_prune: Vec::new(),
        }
    }

    #[test]
    fn reuses_cached_download_without_invoking_downloader() {
        let cache = tempdir().unwrap();
        let defs = tempdir().unwrap();
        let config = test_config(cache.path().to_path_buf());

        fs::write(defs.path().join("sources"), "https://ex/lib-1.0.tar.gz\n").unwrap();
        let cached = config.sources_cache("pkg").join("lib-1.0.tar.gz");
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::write(&cached, b"cached-bytes").unwrap();

        let mut ctx = Context::new(config);
        ctx.downloader = Box::new(FakeDownloader::default()); // would error if invoked
        fetch(&ctx, "pkg", defs.path()).unwrap();
    }

    #[test]
    fn downloads_when_not_cached() {
        let cache = tempdir().unwrap();
        let defs = tempdir().unwrap();
        let config = test_config(cache.path().to_path_buf());
        fs::write(defs.path().join("sources"), "https://ex/lib-1.0.tar.gz\n").unwrap();

        let mut responses = std::collections::HashMap::new();
        responses.insert("https://ex/lib-1.0.tar.gz".to_string(), b"bytes".to_vec());

        let mut ctx = Context::new(config.clone());
        ctx.downloader = Box::new(FakeDownloader { responses });
        fetch(&ctx, "pkg", defs.path()).unwrap();

        let dest = config.sources_cache("pkg").join("lib-1.0.tar.gz");
        assert_eq!(fs::read(dest).unwrap(), b"bytes");
    }

    #[test]
    fn local_source_missing_is_an_error() {
        let cache = tempdir().unwrap();
        let defs = tempdir().unwrap();
        let config = test_config(cache.path().to_path_buf());
        fs::write(defs.path().join("sources"), "patch.diff\n").unwrap();

        let ctx = Context::new(config);
        assert!(fetch(&ctx, "pkg", defs.path()).is_err());
    }

    #[test]
    fn verify_detects_mismatch() {
        let cache = tempdir().unwrap();
        let defs = tempdir().unwrap();
        let config = test_config(cache.path().to_path_buf());
        fs::write(defs.path().join("sources"), "local.tar\n").unwrap();
        fs::write(defs.path().join("local.tar"), b"abc").unwrap();
        fs::write(defs.path().join("checksums"), "deadbeef\n").unwrap();

        assert!(matches!(
            verify(&config, "pkg", defs.path()),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
