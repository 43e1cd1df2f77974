use std::sync::OnceLock;

use crate::scan::CancelToken;

static INTERRUPT_TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_interrupt(_: libc::c_int) {
    if let Some(token) = INTERRUPT_TOKEN.get() {
        token.cancel();
    }

    // A second Ctrl-C terminates the process as usual.
    // SAFETY: signal is async-signal-safe and SIG_DFL is always a valid disposition.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Cancels `token` on the first SIGINT, so the scan stops dispatching
/// probes and still reports what it has.
///
/// Only the first token ever registered is hooked; later calls return false.
pub fn cancel_on_interrupt(token: &CancelToken) -> bool {
    if INTERRUPT_TOKEN.set(token.clone()).is_err() {
        return false;
    }

    let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only touches an already initialized OnceLock and atomics.
    unsafe { libc::signal(libc::SIGINT, handler) != libc::SIG_ERR }
}
