//! Error type shared by every main-line operation.
//!
//! Handler context never produces one of these: anything that goes wrong
//! inside a signal handler is swallowed on the spot.

use crate::coordinator::ProcessState;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures surfaced to the coordinator, grouped by how it must react.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SignalError {
    /// Installing a handler, a mask or a disposition failed.
    #[error("setup failed: {action}: {source}")]
    Setup { action: String, source: Errno },

    /// Sending a signal to another process failed, e.g. it already exited.
    #[error("failed to deliver {signal} to pid {target}: {source}")]
    Delivery {
        signal: Signal,
        target: Pid,
        source: Errno,
    },

    /// The configured signal sets overlap in a way that cannot be applied.
    #[error("invalid signal policy: {0}")]
    InvalidPolicy(String),

    /// A lifecycle step was skipped or repeated.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: ProcessState, to: ProcessState },

    /// fork/wait failed.
    #[error("process control failed while trying to {action}: {source}")]
    Process { action: &'static str, source: Errno },

    /// Writing to the console sink failed.
    #[error("console output failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SignalError {
    pub(crate) fn setup(action: impl Into<String>, source: Errno) -> Self {
        SignalError::Setup {
            action: action.into(),
            source,
        }
    }

    pub(crate) fn process(action: &'static str, source: Errno) -> Self {
        SignalError::Process { action, source }
    }

    /// Whether the owning process has to give up.
    ///
    /// Delivery failures are reported and skipped; everything else means
    /// the environment cannot run the process tree.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SignalError::Delivery { .. })
    }
}
