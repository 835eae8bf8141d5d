//! Crate-wide error taxonomy.
//!
//! Every variant maps to one distinct user-visible message. Variants
//! that can occur while a package name is in context carry it so the message
//! is always diagnosable in a multi-package operation.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no search path configured")]
    NoSearchPath,

    #[error("{name}: not found in any repository")]
    NotFound { name: String },

    #[error("{name}: not installed")]
    NotInstalled { name: String },

    #[error("{path}: does not contain a valid package")]
    InvalidPackage { path: PathBuf },

    #[error("missing checksums file for: {}", .names.join(", "))]
    MissingChecksums { names: Vec<String> },

    #[error("checksum mismatch for: {}", .names.join(", "))]
    ChecksumMismatch { names: Vec<String> },

    #[error("{name}: download failed: {reason}")]
    DownloadFailed { name: String, reason: String },

    #[error("{name}: extract failed: {reason}")]
    ExtractFailed { name: String, reason: String },

    #[error("{name}: build failed (exit {code:?})")]
    BuildFailed { name: String, code: Option<i32> },

    #[error("conflict: {path} already owned by {owner}")]
    Conflict { path: String, owner: String },

    #[error("{name}: not built, run `build {name}` first")]
    NotBuilt { name: String },

    #[error("missing dependencies for {name}: {}", .missing.join(", "))]
    MissingDeps { name: String, missing: Vec<String> },

    #[error("{name}: required by {}", .dependents.join(", "))]
    RequiredBy {
        name: String,
        dependents: Vec<String>,
    },

    #[error("invalid package name: {name}")]
    InvalidName { name: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
