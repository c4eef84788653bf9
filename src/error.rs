//! Error taxonomy for net-tester sessions.
//!
//! Mirrors the `enyx::net_tester::error::Error` enum of the original
//! implementation: an exhaustive set of terminal causes plus a catch-all
//! for transport I/O failures. Once a session latches one of these into
//! its `first_failure` slot, no later error can overwrite it.

use std::fmt;

/// Every terminal cause a session can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Peer closed the connection before the RX byte budget was met.
    #[error("unexpected eof")]
    UnexpectedEof,

    /// A received byte did not match the expected pattern.
    #[error("checksum failed at byte {offset}: expected {expected}, got {actual}")]
    ChecksumFailed {
        offset: u64,
        expected: u8,
        actual: u8,
    },

    /// The computed test-duration deadline expired.
    #[error("test timeout")]
    TestTimeout,

    /// Bytes arrived on the post-completion EOF probe.
    #[error("unexpected data after receive completion")]
    UnexpectedData,

    /// SIGINT was delivered.
    #[error("user interrupt")]
    UserInterrupt,

    /// SIGTERM was delivered.
    #[error("program termination")]
    ProgramTermination,

    /// Any other watched signal (e.g. SIGHUP) was delivered.
    #[error("unknown signal")]
    UnknownSignal,

    /// Any I/O error surfaced by the transport (connect refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A configuration error caught at session construction time.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable process exit code for this error kind, grounded in the
    /// ordinal values of the original `enum Error` in `Error.hpp`
    /// (`success = 0` is not representable here since `Error` only
    /// exists when a session fails).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnexpectedEof => 2,
            Error::ChecksumFailed { .. } => 3,
            Error::TestTimeout => 4,
            Error::UnexpectedData => 5,
            Error::UserInterrupt => 6,
            Error::ProgramTermination => 7,
            Error::UnknownSignal => 8,
            Error::Transport(_) => 9,
            Error::Configuration(_) => 10,
        }
    }
}

/// A signal caught while a session was active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaughtSignal {
    Interrupt,
    Terminate,
    Other,
}

impl From<CaughtSignal> for Error {
    fn from(signal: CaughtSignal) -> Self {
        match signal {
            CaughtSignal::Interrupt => Error::UserInterrupt,
            CaughtSignal::Terminate => Error::ProgramTermination,
            CaughtSignal::Other => Error::UnknownSignal,
        }
    }
}

impl fmt::Display for CaughtSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaughtSignal::Interrupt => write!(f, "SIGINT"),
            CaughtSignal::Terminate => write!(f, "SIGTERM"),
            CaughtSignal::Other => write!(f, "SIGHUP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let errors: Vec<Error> = vec![
            Error::UnexpectedEof,
            Error::ChecksumFailed {
                offset: 0,
                expected: 0,
                actual: 1,
            },
            Error::TestTimeout,
            Error::UnexpectedData,
            Error::UserInterrupt,
            Error::ProgramTermination,
            Error::UnknownSignal,
            Error::Transport(std::io::Error::from(std::io::ErrorKind::Other)),
            Error::Configuration("bad".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(Error::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
