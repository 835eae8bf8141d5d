//! Critical-section signal blocking: remove and the incremental install copy
//! must run to completion once started, so `SIGINT`/`SIGTERM` are blocked
//! for the duration via an RAII guard whose `Drop` restores the previous
//! mask even if the section panics.

use nix::sys::signal::{SigSet, SigmaskHow, Signal, sigprocmask};

/// Blocks `SIGINT` and `SIGTERM` on construction, restores the prior mask on
/// drop. Construction failure (a platform without signal masking, or a
/// sandboxed environment that denies it) is logged and treated as a no-op:
/// a single cancellation during an unguarded section can leave the target
/// root recoverable-but-not-pristine, relying on re-install idempotence
/// instead.
pub struct CriticalSection {
    previous: Option<SigSet>,
}

impl CriticalSection {
    pub fn enter() -> Self {
        let mut block = SigSet::empty();
        block.add(Signal::SIGINT);
        block.add(Signal::SIGTERM);

        let mut previous = SigSet::empty();
        match sigprocmask(SigmaskHow::SIG_BLOCK, Some(&block), Some(&mut previous)) {
            Ok(()) => {
                tracing::trace!("entered signal-blocked critical section");
                Self { previous: Some(previous) }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not block signals for critical section");
                Self { previous: None }
            }
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        if let Some(previous) = self.previous {
            if let Err(e) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&previous), None) {
                tracing::warn!(error = %e, "could not restore signal mask");
            } else {
                tracing::trace!("left signal-blocked critical section");
            }
        }
    }
}
