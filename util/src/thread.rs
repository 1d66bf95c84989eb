//! Thread naming, a panic hook that turns any panic into a graceful shutdown,
//! and the signal-driven shutdown ceremony used by both World and Scene main
//! loops (spec.md §5 "Shutdown cancels all waits by setting a `running=false`
//! flag and signaling every condvar").

use crossbeam::channel::Sender;
use signal_hook::{consts::TERM_SIGNALS, low_level};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn spawn_with_name<N, F, T>(name: N, f: F) -> std::thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
    N: Into<String>,
{
    std::thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .expect("failed to spawn thread")
}

/// Installs a process-wide panic hook that logs the panic (with backtrace)
/// and notifies `on_panic` so the owning Root can begin a graceful shutdown
/// instead of leaving the process in an undefined state.
pub fn install_panic_hook(on_panic: Sender<String>) {
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let msg = match info.payload().downcast_ref::<&'static str>() {
            Some(s) => (*s).to_string(),
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Box<dyn Any>".to_string(),
            },
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let full = format!("thread '{thread_name}' panicked at {location}: {msg}\n{backtrace:?}");
        tracing::error!(target: "panic", "{}", full);
        let _ = on_panic.send(full);
    }));
}

/// Shared flag flipped by the signal handlers below and checked by every
/// condvar wait loop in `node`/`link` so shutdown cancels all blocking waits.
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        ShutdownFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Registers `TERM_SIGNALS` handlers that set `flag` on first receipt and
/// hard-exit on a second receipt (so an unresponsive shutdown can still be
/// interrupted by the operator).
pub fn register_shutdown_signals(flag: ShutdownFlag) {
    for sig in TERM_SIGNALS {
        let flag_for_exit = flag.clone();
        unsafe {
            low_level::register(*sig, move || {
                if flag_for_exit.is_set() {
                    low_level::exit(1);
                }
            })
        }
        .unwrap_or_else(|e| panic!("cannot register handler for signal {sig}: {e}"));
        let flag_for_trigger = flag.clone();
        unsafe { low_level::register(*sig, move || flag_for_trigger.trigger()) }
            .unwrap_or_else(|e| panic!("cannot register handler for signal {sig}: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_clear_and_latches_once_triggered() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
        flag.trigger();
        assert!(flag.is_set());
    }
}
