//! ELF classification and dynamic-section introspection, used by the strip
//! and fix-dependencies build stages.

use std::path::Path;

use goblin::elf::Elf;
use goblin::elf::header::{ET_DYN, ET_EXEC, ET_REL};
use goblin::elf::section_header::SHT_NOBITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfKind {
    /// Shared object (`ET_DYN`): unneeded-strip.
    SharedObject,
    /// Executable (`ET_EXEC`): full strip.
    Executable,
    /// Relocatable (`ET_REL`): debug-strip.
    Relocatable,
}

/// Read a file's ELF header and classify it. Returns `None` for anything
/// that isn't a recognized ELF object (strip/fixdeps skip those silently).
pub fn classify(path: &Path) -> Option<ElfKind> {
    let bytes = std::fs::read(path).ok()?;
    let elf = Elf::parse(&bytes).ok()?;
    match elf.header.e_type {
        ET_DYN => Some(ElfKind::SharedObject),
        ET_EXEC => Some(ElfKind::Executable),
        ET_REL => Some(ElfKind::Relocatable),
        _ => None,
    }
}

/// Enumerate the `DT_NEEDED` entries (dynamic library references) of an ELF
/// file, in the order they appear in the dynamic section. Empty for files
/// with no dynamic section (static binaries, relocatables).
pub fn needed_libraries(path: &Path) -> Vec<String> {
    let Ok(bytes) = std::fs::read(path) else {
        return Vec::new();
    };
    let Ok(elf) = Elf::parse(&bytes) else {
        return Vec::new();
    };
    elf.libraries.iter().map(|s| s.to_string()).collect()
}

pub fn is_elf(path: &Path) -> bool {
    classify(path).is_some() || {
        std::fs::read(path).ok().is_some_and(|bytes| bytes.len() >= 4 && &bytes[0..4] == b"\x7fELF")
    }
}

/// Does this section belong to the set a strip of `kind` discards?
/// `ElfKind::Relocatable` only drops debug info (symbols are still needed
/// for relocation); the other two kinds also drop the static symbol table.
fn is_strippable(name: &str, kind: ElfKind) -> bool {
    let debug_or_comment = name.starts_with(".debug") || name == ".comment";
    match kind {
        ElfKind::Relocatable => debug_or_comment,
        ElfKind::SharedObject | ElfKind::Executable => {
            debug_or_comment || name == ".symtab" || name == ".strtab"
        }
    }
}

/// Zero the file content of every section `is_strippable` for `kind`,
/// in place. Section headers, offsets and the rest of the file layout are
/// left untouched — this discards symbol/debug contents without the
/// relocation that a true section-removing strip would require. Returns the
/// number of sections zeroed.
pub fn strip_sections(bytes: &mut [u8], kind: ElfKind) -> Result<usize, String> {
    let ranges: Vec<(usize, usize)> = {
        let elf = Elf::parse(bytes).map_err(|e| e.to_string())?;
        elf.section_headers
            .iter()
            .filter(|sh| sh.sh_type != SHT_NOBITS)
            .filter(|sh| is_strippable(elf.shdr_strtab.get_at(sh.sh_name).unwrap_or(""), kind))
            .map(|sh| (sh.sh_offset as usize, sh.sh_size as usize))
            .collect()
    };

    let mut zeroed = 0;
    for (start, size) in ranges {
        if let Some(slice) = bytes.get_mut(start..start + size) {
            slice.fill(0);
            zeroed += 1;
        }
    }
    Ok(zeroed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_elf_file_is_not_classified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"just some text, not an ELF file").unwrap();
        assert_eq!(classify(&path), None);
        assert!(needed_libraries(&path).is_empty());
    }

    #[test]
    fn missing_file_does_not_panic() {
        let path = Path::new("/definitely/does/not/exist/for/kpkg/tests");
        assert_eq!(classify(path), None);
        assert!(needed_libraries(path).is_empty());
    }
}
