// tests/interrupted_syscalls.rs

//! Blocking waits keep going when a signal handler interrupts them.
//!
//! Lives in its own test binary: it installs a process-wide SIGUSR1 handler.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use common::{TestResult, init_tracing};
use nix::libc;
use nix::sys::pthread::{Pthread, pthread_kill, pthread_self};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use procline::process::reap::reap_blocking;
use procline::process::{ExitStatus, ProcessHandle, ReadTimeout};

extern "C" fn noop(_: libc::c_int) {}

/// Install a do-nothing SIGUSR1 handler without `SA_RESTART`, so blocked
/// syscalls fail with EINTR when it runs.
fn install_noop_handler() {
    let action = SigAction::new(SigHandler::Handler(noop), SaFlags::empty(), SigSet::empty());
    // SAFETY: the handler does nothing.
    unsafe { sigaction(Signal::SIGUSR1, &action) }.expect("install SIGUSR1 handler");
}

/// Signal `target` every 50ms until the returned flag is raised.
fn pester(target: Pthread) -> (Arc<AtomicBool>, Arc<AtomicUsize>, thread::JoinHandle<()>) {
    let stop = Arc::new(AtomicBool::new(false));
    let sent = Arc::new(AtomicUsize::new(0));
    let worker = {
        let stop = Arc::clone(&stop);
        let sent = Arc::clone(&sent);
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));
                if pthread_kill(target, Signal::SIGUSR1).is_ok() {
                    sent.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
    };
    (stop, sent, worker)
}

#[test]
fn read_survives_signals_and_still_honours_the_deadline() -> TestResult {
    init_tracing();
    install_noop_handler();
    let mut handle = ProcessHandle::new("/bin/sh")?;
    handle.start_with_args(&["-c", "sleep 5"])?;

    let (stop, sent, worker) = pester(pthread_self());
    let started = Instant::now();
    let outcome = handle.read(ReadTimeout::After(Duration::from_millis(600)));
    let elapsed = started.elapsed();
    stop.store(true, Ordering::SeqCst);
    worker.join().map_err(|_| "signal thread panicked")?;

    let outcome = outcome?;
    assert!(sent.load(Ordering::SeqCst) > 0);
    assert!(outcome.timed_out());
    assert!(outcome.lines.is_empty());
    assert!(elapsed >= Duration::from_millis(600), "returned early: {elapsed:?}");
    Ok(())
}

#[test]
fn blocking_reap_survives_signals() -> TestResult {
    init_tracing();
    install_noop_handler();
    let mut handle = ProcessHandle::new("/bin/sh")?;
    let pid = handle.start_with_args(&["-c", "sleep 0.5; exit 4"])?;

    let (stop, sent, worker) = pester(pthread_self());
    let exit = reap_blocking(pid);
    stop.store(true, Ordering::SeqCst);
    worker.join().map_err(|_| "signal thread panicked")?;

    assert!(sent.load(Ordering::SeqCst) > 0);
    assert_eq!(exit?, ExitStatus::Code(4));
    // Already reaped behind the handle's back: it sees no child and moves on.
    assert!(!handle.is_alive()?);
    assert_eq!(handle.exit_status(), Some(ExitStatus::Unknown));
    Ok(())
}
