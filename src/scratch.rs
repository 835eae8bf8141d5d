//! Per-invocation scratch directories: a build root, a
//! package-staging root, and an extraction root, created on startup and
//! removed on every exit path unless debug mode is set.

use std::path::PathBuf;

use crate::context::Config;
use crate::error::Result;

pub struct Scratch {
    pub build_root: PathBuf,
    pub stage_root: PathBuf,
    pub extract_root: PathBuf,
    debug: bool,
}

impl Scratch {
    /// Create the three per-invocation roots. Dropping the returned guard
    /// removes them again unless `config.debug` is set.
    pub fn create(config: &Config) -> Result<Self> {
        let build_root = config.build_root();
        let stage_root = config.stage_root();
        let extract_root = config.extract_root();

        std::fs::create_dir_all(&build_root)?;
        std::fs::create_dir_all(&stage_root)?;
        std::fs::create_dir_all(&extract_root)?;

        Ok(Self {
            build_root,
            stage_root,
            extract_root,
            debug: config.debug,
        })
    }

    pub fn package_build_dir(&self, name: &str) -> PathBuf {
        self.build_root.join(name)
    }

    pub fn package_stage_dir(&self, name: &str) -> PathBuf {
        self.stage_root.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.debug {
            return;
        }
        for root in [&self.build_root, &self.stage_root, &self.extract_root] {
            let _ = std::fs::remove_dir_all(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cfg(cache_dir: PathBuf, debug: bool) -> Config {
        Config {
            search_path: Vec::new(),
            target_root: PathBuf::from("/nonexistent"),
            cache_dir,
            force: false,
            debug,
            build_log_sink: None,
            process_key: "scratch-test".into(),
            junk_prune: Vec::new(),
        }
    }

    #[test]
    fn creates_and_cleans_up_on_drop() {
        let cache = tempfile::tempdir().unwrap();
        let config = cfg(cache.path().to_path_buf(), false);
        let build_root;
        {
            let scratch = Scratch::create(&config).unwrap();
            build_root = scratch.build_root.clone();
            assert!(build_root.exists());
        }
        assert!(!build_root.exists());
    }

    #[test]
    fn debug_mode_preserves_scratch() {
        let cache = tempfile::tempdir().unwrap();
        let config = cfg(cache.path().to_path_buf(), true);
        let build_root;
        {
            let scratch = Scratch::create(&config).unwrap();
            build_root = scratch.build_root.clone();
        }
        assert!(build_root.exists());
    }
}
