//! Remove procedure: reverse-dependency check, then
//! manifest-directed deletion with interruption blocked for the duration.

use std::fs;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::installed_db;
use crate::manifest;
use crate::metadata::DependKind;
use crate::reporter::Event;
use crate::resolver::{self, ResolveMode};
use crate::signal_guard::CriticalSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    Check,
    Force,
}

/// Remove a single installed package.
pub fn remove(ctx: &mut Context, name: &str, mode: RemoveMode) -> Result<()> {
    if !installed_db::is_installed(&ctx.config, name) {
        return Err(Error::NotInstalled { name: name.to_string() });
    }

    if mode == RemoveMode::Check {
        let dependents = reverse_dependents(ctx, name);
        if !dependents.is_empty() {
            return Err(Error::RequiredBy { name: name.to_string(), dependents });
        }
    }

    let manifest_path = installed_db::manifest_path(&ctx.config, name);
    let entries = manifest::read(&manifest_path)?;

    {
        let _guard = CriticalSection::enter();
        for path in &entries {
            if manifest::is_under_etc(path) {
                continue;
            }
            let target = crate::context::join_root(&ctx.config.target_root, path);
            if path.ends_with('/') {
                let _ = fs::remove_dir(&target);
            } else {
                let _ = fs::remove_file(&target);
            }
        }
    }

    ctx.reporter.report(Event::PackageRemoved { name: name.to_string() });
    Ok(())
}

/// Every installed package whose `depends` file lists `name` on any
/// exact-match line, runtime or make.
fn reverse_dependents(ctx: &Context, name: &str) -> Vec<String> {
    let mut dependents = Vec::new();
    for other in installed_db::installed_names(&ctx.config) {
        if other == name {
            continue;
        }
        let entry = installed_db::entry_path(&ctx.config, &other);
        let deps = crate::metadata::read_depends(&entry);
        if deps.iter().any(|(dep, _kind): &(String, DependKind)| dep == name) {
            dependents.push(other);
        }
    }
    dependents
}

/// Remove `roots` and every dependency that only they require, in
/// dependency order restricted to the user-named roots.
pub fn remove_batch(ctx: &mut Context, roots: &[String], mode: RemoveMode) -> Result<Vec<String>> {
    for name in roots {
        crate::name::validate(name)?;
    }

    let resolved = resolver::resolve(&ctx.config, roots, ResolveMode::Remove)?;
    let root_set: std::collections::HashSet<&str> = roots.iter().map(String::as_str).collect();

    let mut removed = Vec::new();
    for name in &resolved.order {
        if !root_set.contains(name.as_str()) {
            continue;
        }
        remove(ctx, name, mode)?;
        removed.push(name.clone());
    }
    Ok(removed)
}
