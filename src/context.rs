//! Per-invocation configuration and collaborators, threaded explicitly.
//!
//! This crate builds one `Context` per invocation and passes `&Context`
//! into every pipeline function. There is no module-level mutable state
//! anywhere in this crate.

use std::env;
use std::path::{Path, PathBuf};

use crate::process::{BuildRunner, Downloader, PostInstallRunner, RealBuildRunner, RealDownloader, RealPostInstallRunner};
use crate::reporter::{NullReporter, Reporter};

/// Default relative path, under the target root, of the installed-db.
pub const INSTALLED_DB_PATH: &str = "var/db/kiss/installed";

const DEFAULT_JUNK: &[&str] = &[
    "usr/share/doc",
    "usr/share/info",
    "usr/share/gettext",
    "usr/share/locale",
    "usr/share/bash-completion",
    "usr/share/zsh",
    "usr/share/polkit-1/rules.d",
    "usr/lib/charset.alias",
];

/// Environment-derived configuration. Carries no collaborators so it stays
/// trivially cloneable and testable without fakes.
#[derive(Debug, Clone)]
pub struct Config {
    pub search_path: Vec<PathBuf>,
    pub target_root: PathBuf,
    pub cache_dir: PathBuf,
    pub force: bool,
    pub debug: bool,
    pub build_log_sink: Option<PathBuf>,
    pub process_key: String,
    pub junk_prune: Vec<PathBuf>,
}

impl Config {
    /// Build configuration from the environment.
    pub fn from_env() -> Self {
        let search_path = env::var("KISS_PATH")
            .ok()
            .map(|v| v.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
            .unwrap_or_default();

        let target_root = env::var("KISS_ROOT")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));

        let cache_dir = env::var("KISS_CACHE_DIR")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join("kpkg")
            });

        let force = env_flag("KISS_FORCE");
        let debug = env_flag("KISS_DEBUG");

        let build_log_sink = env::var("KISS_LOG").ok().map(PathBuf::from);

        let process_key = env::var("KISS_PID").unwrap_or_else(|_| std::process::id().to_string());

        let junk_prune = env::var("KISS_JUNK_PRUNE")
            .ok()
            .map(|v| v.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
            .unwrap_or_else(|| DEFAULT_JUNK.iter().map(PathBuf::from).collect());

        Self {
            search_path,
            target_root,
            cache_dir,
            force,
            debug,
            build_log_sink,
            process_key,
            junk_prune,
        }
    }

    pub fn installed_db_root(&self) -> PathBuf {
        self.target_root.join(INSTALLED_DB_PATH)
    }

    pub fn sources_cache(&self, name: &str) -> PathBuf {
        self.cache_dir.join("sources").join(name)
    }

    pub fn bin_cache(&self) -> PathBuf {
        self.cache_dir.join("bin")
    }

    pub fn build_root(&self) -> PathBuf {
        self.cache_dir.join(format!("build-{}", self.process_key))
    }

    pub fn stage_root(&self) -> PathBuf {
        self.cache_dir.join(format!("pkg-{}", self.process_key))
    }

    pub fn extract_root(&self) -> PathBuf {
        self.cache_dir.join(format!("extract-{}", self.process_key))
    }
}

fn env_flag(key: &str) -> bool {
    match env::var(key) {
        Ok(v) => !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false")),
        Err(_) => false,
    }
}

/// Bundle of configuration plus every injected collaborator, passed by
/// reference into every core entry point.
pub struct Context {
    pub config: Config,
    pub reporter: Box<dyn Reporter>,
    pub downloader: Box<dyn Downloader>,
    pub build_runner: Box<dyn BuildRunner>,
    pub post_install_runner: Box<dyn PostInstallRunner>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            reporter: Box::new(NullReporter),
            downloader: Box::new(RealDownloader::new()),
            build_runner: Box::new(RealBuildRunner),
            post_install_runner: Box::new(RealPostInstallRunner),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn target_path(&self, absolute: &str) -> PathBuf {
        join_root(&self.config.target_root, absolute)
    }
}

/// Join an absolute manifest-style path (`/usr/bin/foo`) onto a root.
pub fn join_root(root: &Path, absolute: &str) -> PathBuf {
    root.join(absolute.trim_start_matches('/'))
}
