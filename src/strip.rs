//! Strip stage: walk the stage, classify each regular file's
//! ELF header, and strip accordingly. Skipped entirely when a `nostrip`
//! marker is present on the staged package definition. Individual strip
//! failures are tolerated — they're reported as warnings, never abort the
//! pipeline.

use std::path::Path;

use walkdir::WalkDir;

use crate::elf::{self, ElfKind};
use crate::error::Result;

/// Stripping is implemented directly against `goblin`'s section-header
/// table (see `elf::strip_sections`), not by shelling out to `strip(1)`.
/// It stays behind a one-method trait anyway so tests can supply a fake
/// that doesn't need a parseable ELF fixture to exercise the walk/report
/// logic.
pub trait Stripper: Send {
    fn strip(&self, path: &Path, kind: ElfKind) -> std::io::Result<()>;
}

pub struct RealStripper;

impl Stripper for RealStripper {
    fn strip(&self, path: &Path, kind: ElfKind) -> std::io::Result<()> {
        let mut bytes = std::fs::read(path)?;
        elf::strip_sections(&mut bytes, kind).map_err(std::io::Error::other)?;
        std::fs::write(path, bytes)
    }
}

/// Result of a strip pass: how many files were stripped, and any per-file
/// warnings (tolerated, never fatal).
#[derive(Debug, Default)]
pub struct StripReport {
    pub stripped: usize,
    pub warnings: Vec<(String, String)>,
}

/// Strip every ELF file under `stage_dir`. Non-ELF files are silently
/// skipped; individual failures are recorded as warnings and do not abort.
pub fn strip_stage(stripper: &dyn Stripper, stage_dir: &Path) -> Result<StripReport> {
    let mut report = StripReport::default();

    for entry in WalkDir::new(stage_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(kind) = elf::classify(path) else {
            continue;
        };
        match stripper.strip(path, kind) {
            Ok(()) => report.stripped += 1,
            Err(e) => report.warnings.push((path.display().to_string(), e.to_string())),
        }
    }

    Ok(report)
}
