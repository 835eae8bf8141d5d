//! Top-level operation dispatch: the one entry point a CLI (or any
//! other embedder) calls into once it has parsed an action and package list.

use crate::build::{self, BuildOptions};
use crate::context::Context;
use crate::error::Result;
use crate::install::{self, InstallOptions, InstallSource};
use crate::installed_db;
use crate::metadata;
use crate::remove::{self, RemoveMode};
use crate::repo;
use crate::source_cache;
use crate::update;

#[derive(Debug, Clone)]
pub enum Action {
    Build(Vec<String>),
    Checksum(Vec<String>),
    Install(Vec<String>),
    List(Vec<String>),
    Remove(Vec<String>),
    Search(String),
    Update,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Built(Vec<String>),
    ChecksumsPrinted(Vec<(String, Vec<String>)>),
    Installed(Vec<String>),
    Listed(Vec<(String, metadata::VersionRelease)>),
    Removed(Vec<String>),
    SearchResults(Vec<String>),
    Updated(update::UpdateOutcome),
}

/// Dispatch one parsed CLI action through its corresponding procedure.
pub fn dispatch(ctx: &mut Context, action: Action) -> Result<Outcome> {
    match action {
        Action::Build(names) => {
            let roots = if names.is_empty() { installed_db::installed_names(&ctx.config) } else { names };
            let built = build::build(ctx, &roots, BuildOptions::default())?;
            Ok(Outcome::Built(built))
        }
        Action::Checksum(names) => {
            let mut out = Vec::new();
            for name in names {
                crate::name::validate(&name)?;
                let hits = repo::find(&ctx.config, &name, repo::Mode::First)?;
                let def_dir = hits.first().expect("repo::find guarantees at least one hit on success");
                let sums = source_cache::checksum(&ctx.config, &name, def_dir)?;
                out.push((name, sums));
            }
            Ok(Outcome::ChecksumsPrinted(out))
        }
        Action::Install(targets) => {
            let mut installed = Vec::new();
            for target in targets {
                let source = if target.ends_with(".tar.gz") {
                    InstallSource::Tarball(target.into())
                } else {
                    crate::name::validate(&target)?;
                    InstallSource::Name(target)
                };
                let name = install::install(ctx, &source, InstallOptions { force: ctx.config.force })?;
                installed.push(name);
            }
            Ok(Outcome::Installed(installed))
        }
        Action::List(names) => {
            let filter = if names.is_empty() { None } else { Some(names.as_slice()) };
            let entries = installed_db::list_installed(&ctx.config, filter)?;
            Ok(Outcome::Listed(entries))
        }
        Action::Remove(names) => {
            let mode = if ctx.config.force { RemoveMode::Force } else { RemoveMode::Check };
            let removed = remove::remove_batch(ctx, &names, mode)?;
            Ok(Outcome::Removed(removed))
        }
        Action::Search(pattern) => {
            crate::name::validate_pattern(&pattern)?;
            let hits = repo::search(&ctx.config, &pattern)?;
            Ok(Outcome::SearchResults(hits.into_iter().map(|(name, _)| name).collect()))
        }
        Action::Update => Ok(Outcome::Updated(update::update(ctx)?)),
    }
}
