//! Thin CLI binary: parse argv, build a `Context` from the environment, wire
//! up a console `Reporter` and `tracing` subscriber, dispatch, and translate
//! the result to an exit code.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use kpkg::context::{Config, Context};
use kpkg::dispatch::{self, Action, Outcome};
use kpkg::reporter::{Event, Reporter};
use kpkg::update::UpdateOutcome;

#[derive(Parser)]
#[command(name = "kpkg", about = "Source-based package manager")]
struct Cli {
    #[command(subcommand)]
    action: CliAction,
}

#[derive(Subcommand)]
enum CliAction {
    /// Build one or more packages (no arguments rebuilds everything installed).
    #[command(alias = "b")]
    Build { packages: Vec<String> },
    /// Print the checksums of a package's sources.
    #[command(alias = "c")]
    Checksum { packages: Vec<String> },
    /// Install package names or .tar.gz paths.
    #[command(alias = "i")]
    Install { targets: Vec<String> },
    /// List installed packages.
    #[command(alias = "l")]
    List { packages: Vec<String> },
    /// Remove installed packages.
    #[command(alias = "r")]
    Remove { packages: Vec<String> },
    /// Search repositories with a shell-style wildcard pattern.
    #[command(alias = "s")]
    Search { pattern: String },
    /// Update everything outdated against the repositories.
    #[command(alias = "u")]
    Update,
    /// Print the version and exit.
    #[command(alias = "v")]
    Version,
}

/// Renders `Event`s to stdout/stderr. The unstructured `tracing` layer
/// carries diagnostics separately; this is the stable,
/// user-facing surface.
struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, event: Event) {
        match event {
            Event::RepoScanStarted => {}
            Event::PackageLintOk { .. } => {}
            Event::PackageFetchStarted { name } => println!("{name}: fetching sources"),
            Event::PackageFetchCached { name, file } => println!("{name}: {file} (cached)"),
            Event::PackageFetchDownloaded { name, file } => println!("{name}: {file} downloaded"),
            Event::PackageChecksumOk { name } => println!("{name}: checksums ok"),
            Event::PackageBuildStarted { name } => println!("{name}: building"),
            Event::PackageBuildFinished { name } => println!("{name}: build finished"),
            Event::PackageStripped { name, files } => println!("{name}: stripped {files} file(s)"),
            Event::PackageFixdepsFinished { name, added } if !added.is_empty() => {
                println!("{name}: fixdeps added {}", added.join(", "));
            }
            Event::PackageFixdepsFinished { .. } => {}
            Event::PackageTarred { name, path } => println!("{name}: packaged {path}"),
            Event::PackageInstalled { name } => println!("{name}: installed"),
            Event::PackageRemoved { name } => println!("{name}: removed"),
            Event::Warning { name, message } => match name {
                Some(name) => eprintln!("{name}: warning: {message}"),
                None => eprintln!("warning: {message}"),
            },
            Event::BatchSummary { succeeded, failed } => {
                println!("{} built, {} failed", succeeded.len(), failed.len());
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.action, CliAction::Version) {
        println!("kpkg {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = Config::from_env();
    let mut ctx = Context::new(config).with_reporter(Box::new(ConsoleReporter));

    let action = match cli.action {
        CliAction::Build { packages } => Action::Build(packages),
        CliAction::Checksum { packages } => Action::Checksum(packages),
        CliAction::Install { targets } => Action::Install(targets),
        CliAction::List { packages } => Action::List(packages),
        CliAction::Remove { packages } => Action::Remove(packages),
        CliAction::Search { pattern } => Action::Search(pattern),
        CliAction::Update => Action::Update,
        CliAction::Version => unreachable!("handled above"),
    };

    match dispatch::dispatch(&mut ctx, action) {
        Ok(Outcome::Listed(entries)) => {
            for (name, vr) in entries {
                println!("{name} {}", vr.tag());
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::SearchResults(mut names)) => {
            names.sort();
            for name in names {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::ChecksumsPrinted(entries)) => {
            for (name, sums) in entries {
                println!("{name}:");
                for sum in sums {
                    println!("  {sum}");
                }
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::Updated(UpdateOutcome::SelfUpdated)) => {
            println!("kpkg updated itself; re-run the previous command");
            reexec();
            ExitCode::SUCCESS
        }
        Ok(Outcome::Updated(UpdateOutcome::UpToDate)) => {
            println!("everything up to date");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Updated(UpdateOutcome::Updated(names))) => {
            println!("updated: {}", names.join(", "));
            ExitCode::SUCCESS
        }
        Ok(Outcome::Built(_) | Outcome::Installed(_) | Outcome::Removed(_)) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kpkg: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Re-exec the freshly installed binary in place rather than continuing
/// in-process with a stale image.
#[cfg(unix)]
fn reexec() {
    use std::os::unix::process::CommandExt;
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Ok(exe) = std::env::current_exe() {
        let err = std::process::Command::new(exe).args(args).exec();
        eprintln!("kpkg: failed to re-exec after self-update: {err}");
    }
}

#[cfg(not(unix))]
fn reexec() {}
