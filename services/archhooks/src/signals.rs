//! Signal handling
//!
//! SIGINT, SIGTERM and SIGHUP ask for a clean shutdown and are delivered to
//! async code through [`ShutdownListener`]. Everything else is a crash: the
//! handler installed by [`install_crash_handler`] reports it on stderr and
//! lets the default action (core dump) run.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tokio::signal::unix::{signal, SignalKind};

use crate::error::{HookError, HookResult};

/// Signals routed to the crash handler.
pub const CRASH_SIGNALS: [Signal; 5] = [
    Signal::SIGSEGV,
    Signal::SIGBUS,
    Signal::SIGILL,
    Signal::SIGFPE,
    Signal::SIGABRT,
];

/// Only the user-initiated termination signals are not fatal.
pub fn is_fatal_signal(sig: Signal) -> bool {
    !matches!(sig, Signal::SIGINT | Signal::SIGTERM | Signal::SIGHUP)
}

/// Waits for a clean-shutdown request.
///
/// Handlers are registered in `new`, so a signal raised right after
/// construction is not lost. Must be created inside a tokio runtime.
pub struct ShutdownListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

impl ShutdownListener {
    pub fn new() -> HookResult<Self> {
        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| HookError::Signal(format!("{}: {}", name, e)))
        };

        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
            hangup: register(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Resolve with the first shutdown signal received.
    pub async fn recv(&mut self) -> Signal {
        let sig = tokio::select! {
            _ = self.interrupt.recv() => Signal::SIGINT,
            _ = self.terminate.recv() => Signal::SIGTERM,
            _ = self.hangup.recv() => Signal::SIGHUP,
        };
        log::info!("Received {}, shutting down", sig.as_str());
        sig
    }
}

const CRASH_PREFIX: &[u8] = b"\nFatal signal: ";

fn crash_label(signum: libc::c_int) -> &'static [u8] {
    match signum {
        libc::SIGSEGV => b"SIGSEGV (segmentation fault)\n",
        libc::SIGBUS => b"SIGBUS (bus error)\n",
        libc::SIGILL => b"SIGILL (illegal instruction)\n",
        libc::SIGFPE => b"SIGFPE (arithmetic exception)\n",
        libc::SIGABRT => b"SIGABRT (aborted)\n",
        _ => b"unknown\n",
    }
}

// Async-signal-safe calls only.
extern "C" fn crash_signal_handler(signum: libc::c_int) {
    let label = crash_label(signum);
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            CRASH_PREFIX.as_ptr() as *const libc::c_void,
            CRASH_PREFIX.len(),
        );
        libc::write(
            libc::STDERR_FILENO,
            label.as_ptr() as *const libc::c_void,
            label.len(),
        );
        // SA_RESETHAND put the default action back
        libc::raise(signum);
    }
}

// One-shot: the default action is back before the handler re-raises.
fn crash_action() -> SigAction {
    SigAction::new(
        SigHandler::Handler(crash_signal_handler),
        SaFlags::SA_RESETHAND | SaFlags::SA_NODEFER,
        SigSet::empty(),
    )
}

/// Route [`CRASH_SIGNALS`] to the crash handler.
pub fn install_crash_handler() -> HookResult<()> {
    let action = crash_action();
    for sig in CRASH_SIGNALS {
        unsafe { sigaction(sig, &action) }
            .map_err(|e| HookError::Signal(format!("sigaction({}): {}", sig.as_str(), e)))?;
    }

    log::debug!("Crash handler installed for {} signals", CRASH_SIGNALS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fatal_signal_classification() {
        assert!(!is_fatal_signal(Signal::SIGINT));
        assert!(!is_fatal_signal(Signal::SIGTERM));
        assert!(!is_fatal_signal(Signal::SIGHUP));
        assert!(is_fatal_signal(Signal::SIGSEGV));
        assert!(is_fatal_signal(Signal::SIGABRT));
        assert!(is_fatal_signal(Signal::SIGUSR1));
        assert!(CRASH_SIGNALS.iter().all(|s| is_fatal_signal(*s)));
    }

    #[test]
    fn test_crash_labels() {
        assert_eq!(crash_label(libc::SIGSEGV), b"SIGSEGV (segmentation fault)\n");
        assert_eq!(crash_label(libc::SIGUSR2), b"unknown\n");
    }

    #[test]
    fn test_crash_action_is_one_shot() {
        let action = crash_action();
        assert!(matches!(action.handler(), SigHandler::Handler(_)));
        assert!(action.flags().contains(SaFlags::SA_RESETHAND));
        assert!(action.flags().contains(SaFlags::SA_NODEFER));
        assert!(!action.flags().contains(SaFlags::SA_SIGINFO));
        assert!(CRASH_SIGNALS.iter().all(|sig| !action.mask().contains(*sig)));
    }

    #[tokio::test]
    async fn test_shutdown_on_hangup() {
        let mut listener = ShutdownListener::new().unwrap();
        nix::sys::signal::raise(Signal::SIGHUP).unwrap();

        let sig = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .expect("no shutdown signal delivered");
        assert_eq!(sig, Signal::SIGHUP);
    }
}
