//! Structured, user-facing progress events.
//!
//! The core never prints to stdout/stderr itself; it hands `Event`s to
//! whatever `Reporter` the caller supplied. The CLI's reporter renders these;
//! a library embedder can supply its own, or `NullReporter` to stay silent.
//! This is a stable, match-able surface, separate from the unstructured
//! `tracing` diagnostics emitted alongside it.

/// One reportable moment in an operation's lifecycle.
#[derive(Debug, Clone)]
pub enum Event {
    RepoScanStarted,
    PackageLintOk { name: String },
    PackageFetchStarted { name: String },
    PackageFetchCached { name: String, file: String },
    PackageFetchDownloaded { name: String, file: String },
    PackageChecksumOk { name: String },
    PackageBuildStarted { name: String },
    PackageBuildFinished { name: String },
    PackageStripped { name: String, files: usize },
    PackageFixdepsFinished { name: String, added: Vec<String> },
    PackageTarred { name: String, path: String },
    PackageInstalled { name: String },
    PackageRemoved { name: String },
    Warning { name: Option<String>, message: String },
    BatchSummary { succeeded: Vec<String>, failed: Vec<String> },
}

pub trait Reporter: Send {
    fn report(&self, event: Event);
}

/// Discards every event. Default for library use and for tests that don't
/// assert on reporter output.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: Event) {}
}

/// Collects every event for test assertions.
#[derive(Default)]
pub struct RecordingReporter {
    events: std::sync::Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
