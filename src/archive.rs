//! Multi-codec archive extraction and tarball creation.
//!
//! A source whose name matches `*.tar`, `*.tar.??`, `*.tar.???`,
//! `*.tar.????`, or `*.tgz` is extracted with strip-components=1; anything
//! else is copied verbatim.

use std::fs;
use std::io::Read;
use std::path::Path;

use tar::Archive;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Gzip,
    Xz,
    Bzip2,
    Zstd,
    Plain,
}

/// Does this source filename match the tar-archive extension-length
/// pattern (`.tar`, `.tar.gz`/`.xz`/`.br`, `.tar.bz2`/`.lz4`, `.tar.zstd`,
/// or `.tgz`)?
pub fn is_tar_archive(filename: &str) -> bool {
    if filename.ends_with(".tgz") || filename.ends_with(".tar") {
        return true;
    }
    match filename.split_once(".tar.") {
        Some((_, ext)) => matches!(ext.len(), 2..=4),
        None => false,
    }
}

fn codec_for(filename: &str) -> Codec {
    if filename.ends_with(".tgz") {
        return Codec::Gzip;
    }
    match filename.rsplit_once('.') {
        Some((_, "gz")) => Codec::Gzip,
        Some((_, "xz") | (_, "lzma")) => Codec::Xz,
        Some((_, "bz2") | (_, "bz")) => Codec::Bzip2,
        Some((_, "zst") | (_, "zstd")) => Codec::Zstd,
        _ => Codec::Plain,
    }
}

/// Extract `archive_path` into `dest_dir`, stripping the first path
/// component. The archive's codec is detected from its filename, not merely
/// its extension length, and dispatched to the matching decoder.
pub fn extract_stripped(name: &str, archive_path: &Path, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    let filename = archive_path.file_name().and_then(|s| s.to_str()).unwrap_or_default();

    let tar_reader: Box<dyn Read> = match codec_for(filename) {
        Codec::Gzip => Box::new(flate2::read::GzDecoder::new(fs::File::open(archive_path)?)),
        Codec::Xz => Box::new(xz2::read::XzDecoder::new(fs::File::open(archive_path)?)),
        Codec::Bzip2 => Box::new(bzip2::read::BzDecoder::new(fs::File::open(archive_path)?)),
        Codec::Zstd => Box::new(zstd::stream::read::Decoder::new(fs::File::open(archive_path)?).map_err(|e| {
            Error::ExtractFailed { name: name.to_string(), reason: e.to_string() }
        })?),
        Codec::Plain => Box::new(fs::File::open(archive_path)?),
    };

    let mut archive = Archive::new(tar_reader);
    for entry in archive.entries()? {
        let mut entry = entry.map_err(|e| Error::ExtractFailed { name: name.to_string(), reason: e.to_string() })?;
        let path = entry.path().map_err(|e| Error::ExtractFailed { name: name.to_string(), reason: e.to_string() })?;
        let mut components = path.components();
        components.next(); // strip-components=1
        let stripped: std::path::PathBuf = components.as_path().to_path_buf();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let target = dest_dir.join(&stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&target)
            .map_err(|e| Error::ExtractFailed { name: name.to_string(), reason: e.to_string() })?;
    }
    Ok(())
}

/// Extract a staged package tarball in full, with no path-component
/// stripping: its contents are already rooted at `./`, unlike a fetched
/// source archive.
pub fn extract_full(name: &str, archive_path: &Path, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    let file = fs::File::open(archive_path)?;
    let gz = flate2::read::GzDecoder::new(file);
    let mut archive = Archive::new(gz);
    archive
        .unpack(dest_dir)
        .map_err(|e| Error::ExtractFailed { name: name.to_string(), reason: e.to_string() })
}

/// Copy a non-archive source verbatim into its destination directory.
pub fn copy_verbatim(src: &Path, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    let filename = src.file_name().ok_or_else(|| Error::ExtractFailed {
        name: src.display().to_string(),
        reason: "source has no filename".into(),
    })?;
    fs::copy(src, dest_dir.join(filename))?;
    Ok(())
}

/// Gzip-tar `stage_dir`'s contents (rooted at `./`) into `dest_tarball`.
pub fn create_tarball(stage_dir: &Path, dest_tarball: &Path) -> Result<()> {
    if let Some(parent) = dest_tarball.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(dest_tarball)?;
    let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(enc);
    builder.append_dir_all(".", stage_dir)?;
    builder.into_inner()?.finish()?;
    Ok(())
}
