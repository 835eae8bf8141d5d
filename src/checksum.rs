//! Checksum engine: compute and compare ordered SHA-256 lists.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// SHA-256 of a file's full contents, lower-hex encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// Byte-exact comparison of two checksum lists, including order. This is
/// never auto-repaired: a mismatch is always `ChecksumMismatch`.
pub fn lists_match(computed: &[String], stored: &[String]) -> bool {
    computed == stored
}
