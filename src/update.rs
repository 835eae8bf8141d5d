//! Update procedure: diff installed versus repository
//! versions, handle the self-update special case, then build+install
//! everything else outdated.

use crate::build::{self, BuildOptions};
use crate::context::Context;
use crate::error::Result;
use crate::installed_db;
use crate::metadata;
use crate::repo::{self, Mode};
use crate::reporter::Event;

/// The manager's own package name in the repository, used to detect the
/// self-update special case.
pub const SELF_PACKAGE_NAME: &str = "kpkg";

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Nothing was outdated.
    UpToDate,
    /// The manager itself was outdated: it alone was built and installed.
    /// The caller must instruct the user to re-run, ideally by
    /// re-executing the freshly installed binary.
    SelfUpdated,
    /// Every name here was outdated, built, and installed.
    Updated(Vec<String>),
}

/// Diff every installed package's version-release against its repository
/// definition and update whatever has drifted.
pub fn update(ctx: &mut Context) -> Result<UpdateOutcome> {
    let outdated = outdated_packages(ctx)?;
    if outdated.is_empty() {
        return Ok(UpdateOutcome::UpToDate);
    }

    if outdated.iter().any(|name| name == SELF_PACKAGE_NAME) {
        ctx.reporter.report(Event::Warning {
            name: Some(SELF_PACKAGE_NAME.to_string()),
            message: "the package manager itself is outdated; updating it alone before anything else".to_string(),
        });
        // `BuildOptions { update: true }` makes the build driver install the
        // manager immediately after its own build, so no separate install
        // call is needed here.
        build::build(ctx, &[SELF_PACKAGE_NAME.to_string()], BuildOptions { update: true })?;
        return Ok(UpdateOutcome::SelfUpdated);
    }

    build::build(ctx, &outdated, BuildOptions { update: true })?;
    Ok(UpdateOutcome::Updated(outdated))
}

fn outdated_packages(ctx: &Context) -> Result<Vec<String>> {
    let installed = installed_db::list_installed(&ctx.config, None)?;
    let mut outdated = Vec::new();

    for (name, installed_vr) in installed {
        let Ok(hits) = repo::find(&ctx.config, &name, Mode::First) else {
            continue;
        };
        let Some(def_dir) = hits.first() else { continue };
        let Ok(repo_vr) = metadata::read_version(def_dir) else {
            continue;
        };
        if repo_vr != installed_vr {
            outdated.push(name);
        }
    }

    Ok(outdated)
}
