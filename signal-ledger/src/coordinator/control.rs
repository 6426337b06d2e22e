/// Trait definitions for process control
use crate::coordinator::exit::ChildExit;
use crate::error::SignalError;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::fmt;

/// Code a spawned child runs; its return value is the exit code.
pub type ChildBody = Box<dyn FnOnce() -> i32>;

/// A spawned child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildHandle {
    pub index: usize,
    pub pid: Pid,
}

impl ChildHandle {
    pub fn new(index: usize, pid: Pid) -> Self {
        Self { index, pid }
    }
}

impl fmt::Display for ChildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "child {} (pid={})", self.index, self.pid)
    }
}

/// The OS surface the coordinator needs - enables mocking in tests.
///
/// Implementing this trait allows driving the coordinator's state machine
/// and wait loop without forking real processes.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessControl {
    /// Start a child process running `body`.
    fn spawn(&mut self, index: usize, body: ChildBody) -> Result<ChildHandle, SignalError>;

    /// Reap one exited child. With `non_blocking` this returns `Ok(None)`
    /// when no child has exited yet.
    fn wait_any(
        &mut self,
        non_blocking: bool,
    ) -> Result<Option<(ChildHandle, ChildExit)>, SignalError>;

    /// Send `signal` to `target`. Failure is a recoverable delivery error.
    fn send_signal(&mut self, target: Pid, signal: Signal) -> Result<(), SignalError>;

    /// Pid of the calling process.
    fn current_pid(&self) -> Pid;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_child_handle_display() {
        let handle = ChildHandle::new(2, Pid::from_raw(3100));
        assert_eq!(handle.to_string(), "child 2 (pid=3100)");
    }

    #[test]
    fn test_process_control_trait_methods() {
        let mut mock = MockProcessControl::new();

        mock.expect_spawn()
            .times(1)
            .returning(|index, _body| Ok(ChildHandle::new(index, Pid::from_raw(500))));
        mock.expect_wait_any()
            .times(1)
            .returning(|_| Ok(Some((ChildHandle::new(0, Pid::from_raw(500)), ChildExit::Exited(0)))));
        mock.expect_send_signal()
            .times(1)
            .returning(|target, signal| {
                Err(SignalError::Delivery {
                    signal,
                    target,
                    source: Errno::ESRCH,
                })
            });
        mock.expect_current_pid().returning(|| Pid::from_raw(1));

        let handle = mock.spawn(0, Box::new(|| 0));
        assert_eq!(handle.ok().map(|h| h.pid), Some(Pid::from_raw(500)));

        let reaped = mock.wait_any(true);
        assert!(matches!(reaped, Ok(Some((_, ChildExit::Exited(0))))));

        let sent = mock.send_signal(Pid::from_raw(500), Signal::SIGHUP);
        assert!(sent.is_err_and(|e| !e.is_fatal()));

        assert_eq!(mock.current_pid(), Pid::from_raw(1));
    }
}
