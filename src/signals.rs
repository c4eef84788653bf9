//! Per-session signal registration, ported from the
//! `boost::asio::signal_set` wiring in `Session::Session`.
//!
//! SIGHUP is conditionally registered since it doesn't exist on every
//! platform (spec §9: "SIGHUP absent on some platforms").

use crate::error::CaughtSignal;

/// Wait for the first of SIGINT, SIGTERM or (on unix) SIGHUP.
/// Returns `None` if every signal stream unexpectedly closed (should
/// not happen in practice, but matches `on_init`'s
/// "error => signal unregistered, return" branch).
pub async fn wait_for_signal() -> Option<CaughtSignal> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return None,
        };
        let mut sighup = signal(SignalKind::hangup()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => Some(CaughtSignal::Interrupt),
            _ = sigterm.recv() => Some(CaughtSignal::Terminate),
            _ = async {
                match sighup.as_mut() {
                    Some(s) => { s.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => Some(CaughtSignal::Other),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(CaughtSignal::Interrupt),
            Err(_) => None,
        }
    }
}
