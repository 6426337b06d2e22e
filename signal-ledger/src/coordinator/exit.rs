//! How a child process ended.

use nix::sys::signal::Signal;

/// Exit status reported by `wait_any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// The child returned from its workload or called exit.
    Exited(i32),

    /// The child was terminated by a signal, usually one whose default
    /// disposition had been restored.
    Signaled(Signal),
}

impl ChildExit {
    pub fn success(&self) -> bool {
        matches!(self, ChildExit::Exited(0))
    }
}

impl std::fmt::Display for ChildExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildExit::Exited(code) => write!(f, "exited with status {code}"),
            ChildExit::Signaled(signal) => write!(f, "terminated by {signal}"),
        }
    }
}
