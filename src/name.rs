//! Package name validation.

use crate::error::{Error, Result};

const FORBIDDEN: &[char] = &['*', '!', '[', ']'];

/// A package name is a non-empty string containing none of `* ! [ ]`.
/// `search` is the one action allowed to use wildcards, so it calls
/// `validate_pattern` instead.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(FORBIDDEN) {
        return Err(Error::InvalidName { name: name.to_string() });
    }
    Ok(())
}

/// Shell-style wildcard patterns are only meaningful for `search`; anything
/// non-empty is accepted there.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(Error::InvalidName { name: pattern.to_string() });
    }
    Ok(())
}
