//! Dependency resolver: depth-first topological ordering with cycle
//! tolerance and already-installed filtering.
//!
//! A pure depth-first visitor over `depends` files with an ordered
//! accumulator and a membership set; the already-installed-and-not-a-root
//! prune is a mode flag rather than a hardcoded rule, so install/remove
//! resolution shares the same walk.

use std::collections::HashSet;

use crate::context::Config;
use crate::error::Result;
use crate::metadata;
use crate::repo::{self, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Build,
    Install,
    Remove,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    /// Full ordering: deepest prerequisites first.
    pub order: Vec<String>,
    /// The subset of the roots that is not also a transitive dependency of
    /// an earlier root.
    pub explicit: Vec<String>,
}

/// `resolve(root_names, mode)`.
pub fn resolve(config: &Config, roots: &[String], mode: ResolveMode) -> Result<Resolved> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut explicit = Vec::new();
    let root_set: HashSet<&str> = roots.iter().map(String::as_str).collect();

    for root in roots {
        let already_reachable = seen.contains(root);
        visit(config, root, mode, &root_set, &mut order, &mut seen)?;
        if !already_reachable {
            explicit.push(root.clone());
        }
    }

    Ok(Resolved { order, explicit })
}

fn visit(
    config: &Config,
    name: &str,
    mode: ResolveMode,
    root_set: &HashSet<&str>,
    order: &mut Vec<String>,
    seen: &mut HashSet<String>,
) -> Result<()> {
    // 1. dedup and cycle tolerance: a node already in the accumulated list
    // (or currently being visited higher up the stack) returns immediately.
    if seen.contains(name) {
        return Ok(());
    }
    seen.insert(name.to_string());

    // 2. build-mode pruning: a non-root node that's already installed
    // contributes nothing further (it's not rebuilt, and its own deps are
    // assumed already satisfied on disk).
    if mode == ResolveMode::Build && !root_set.contains(name) && crate::installed_db::is_installed(config, name) {
        return Ok(());
    }

    // 3. recurse into depends, in file order. Missing/unreadable depends is
    // no dependencies, never an error. A `nodepends` marker on the
    // definition short-circuits resolution for that package.
    if let Ok(hits) = repo::find(config, name, Mode::First) {
        if let Some(def_dir) = hits.first() {
            if !metadata::has_marker(def_dir, "nodepends") {
                for (dep, _kind) in metadata::read_depends(def_dir) {
                    visit(config, &dep, mode, root_set, order, seen)?;
                }
            }
        }
    }

    // 4. append self. Root nodes append here too: the caller tells explicit
    // apart from dependency work via `Resolved::explicit`, which doesn't
    // need a different append order for roots.
    order.push(name.to_string());

    Ok(())
}
