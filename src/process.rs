//! Side-effect collaborators expressed as traits.
//!
//! Every external effect the core depends on — network fetches, spawning the
//! package's own `build`/`post-install` executables — is behind a one-method
//! trait so tests can supply deterministic fakes instead of touching the
//! network or a real shell.

use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

/// The only network surface in the core: fetch `url` to `dest`.
pub trait Downloader: Send {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct RealDownloader {
    client: reqwest::blocking::Client,
}

impl RealDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .expect("failed to build http client"),
        }
    }
}

impl Default for RealDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for RealDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let do_fetch = || -> std::result::Result<(), String> {
            let mut resp = self.client.get(url).send().map_err(|e| e.to_string())?;
            if !resp.status().is_success() {
                return Err(format!("http status {}", resp.status()));
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let mut file = std::fs::File::create(dest).map_err(|e| e.to_string())?;
            resp.copy_to(&mut file).map_err(|e| e.to_string())?;
            Ok(())
        };

        if let Err(reason) = do_fetch() {
            let _ = std::fs::remove_file(dest);
            return Err(Error::DownloadFailed {
                name: url.to_string(),
                reason,
            });
        }
        Ok(())
    }
}

/// Spawns a package's `build` executable.
pub trait BuildRunner: Send {
    fn run(&self, build_script: &Path, staging_dir: &Path, cwd: &Path, log_sink: Option<&Path>) -> Result<ExitStatus>;
}

pub struct RealBuildRunner;

impl BuildRunner for RealBuildRunner {
    fn run(&self, build_script: &Path, staging_dir: &Path, cwd: &Path, log_sink: Option<&Path>) -> Result<ExitStatus> {
        let mut cmd = Command::new(build_script);
        cmd.arg(staging_dir).current_dir(cwd);
        redirect_to_sink(&mut cmd, log_sink)?;
        Ok(cmd.status()?)
    }
}

/// Spawns a package's `post-install` executable. Its exit status is only
/// ever logged by the caller, never turned into an `Err`.
pub trait PostInstallRunner: Send {
    fn run(&self, script: &Path, cwd: &Path) -> Result<ExitStatus>;
}

pub struct RealPostInstallRunner;

impl PostInstallRunner for RealPostInstallRunner {
    fn run(&self, script: &Path, cwd: &Path) -> Result<ExitStatus> {
        let mut cmd = Command::new(script);
        cmd.current_dir(cwd);
        Ok(cmd.status()?)
    }
}

fn redirect_to_sink(cmd: &mut Command, log_sink: Option<&Path>) -> Result<()> {
    match log_sink {
        None => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let file2 = file.try_clone()?;
            cmd.stdout(Stdio::from(file)).stderr(Stdio::from(file2));
        }
    }
    Ok(())
}

/// In-memory downloader for tests: answers from a table of pre-seeded bytes,
/// never touches the network.
#[derive(Default)]
pub struct FakeDownloader {
    pub responses: std::collections::HashMap<String, Vec<u8>>,
}

impl Downloader for FakeDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        match self.responses.get(url) {
            Some(bytes) => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut f = std::fs::File::create(dest)?;
                f.write_all(bytes)?;
                Ok(())
            }
            None => Err(Error::DownloadFailed {
                name: url.to_string(),
                reason: "no fake response configured".into(),
            }),
        }
    }
}

/// Build runner for tests: always succeeds, optionally writes a marker file
/// into the staging dir so a test can assert the script "ran".
pub struct FakeBuildRunner;

impl BuildRunner for FakeBuildRunner {
    fn run(&self, _build_script: &Path, staging_dir: &Path, _cwd: &Path, _log_sink: Option<&Path>) -> Result<ExitStatus> {
        std::fs::create_dir_all(staging_dir)?;
        std::fs::write(staging_dir.join(".built"), b"ok")?;
        Ok(success_status())
    }
}

pub struct FakePostInstallRunner;

impl PostInstallRunner for FakePostInstallRunner {
    fn run(&self, _script: &Path, _cwd: &Path) -> Result<ExitStatus> {
        Ok(success_status())
    }
}

#[cfg(unix)]
fn success_status() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(0)
}

#[cfg(not(unix))]
fn success_status() -> ExitStatus {
    Command::new("cmd").arg("/C").arg("exit 0").status().unwrap()
}
