/// `fork`/`waitpid`/`kill` backed process control
use crate::coordinator::control::{ChildBody, ChildHandle, ProcessControl};
use crate::coordinator::exit::ChildExit;
use crate::error::SignalError;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpid, ForkResult, Pid};
use std::io::{self, Write};

/// Process control for a real process tree.
///
/// Keeps track of the children it forked so reaped pids can be mapped back
/// to their spawn index.
#[derive(Debug, Default)]
pub struct UnixProcessControl {
    children: Vec<ChildHandle>,
}

impl UnixProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_child(&mut self, pid: Pid) -> Option<ChildHandle> {
        let position = self.children.iter().position(|child| child.pid == pid)?;
        Some(self.children.swap_remove(position))
    }
}

impl ProcessControl for UnixProcessControl {
    fn spawn(&mut self, index: usize, body: ChildBody) -> Result<ChildHandle, SignalError> {
        // anything still buffered would otherwise be printed by both processes
        io::stdout().flush()?;
        // SAFETY: the coordinator forks from a single-threaded process; the
        // child runs `body` and exits without returning into the caller.
        match unsafe { fork() }.map_err(|source| SignalError::process("fork", source))? {
            ForkResult::Parent { child } => {
                let handle = ChildHandle::new(index, child);
                log::debug!("spawned {handle}");
                self.children.push(handle);
                Ok(handle)
            }
            ForkResult::Child => {
                let code = body();
                std::process::exit(code)
            }
        }
    }

    fn wait_any(
        &mut self,
        non_blocking: bool,
    ) -> Result<Option<(ChildHandle, ChildExit)>, SignalError> {
        let flags = non_blocking.then_some(WaitPidFlag::WNOHANG);
        loop {
            let (pid, exit) = match waitpid(Option::<Pid>::None, flags) {
                Ok(WaitStatus::StillAlive) => return Ok(None),
                Ok(WaitStatus::Exited(pid, code)) => (pid, ChildExit::Exited(code)),
                Ok(WaitStatus::Signaled(pid, signal, _core_dumped)) => {
                    (pid, ChildExit::Signaled(signal))
                }
                Ok(other) => {
                    log::trace!("ignoring wait status {other:?}");
                    continue;
                }
                Err(Errno::EINTR) => continue,
                Err(source) => return Err(SignalError::process("wait for a child", source)),
            };

            match self.take_child(pid) {
                Some(handle) => return Ok(Some((handle, exit))),
                None => log::warn!("reaped unknown child pid {pid}: {exit}"),
            }
        }
    }

    fn send_signal(&mut self, target: Pid, signal: Signal) -> Result<(), SignalError> {
        kill(target, signal).map_err(|source| SignalError::Delivery {
            signal,
            target,
            source,
        })
    }

    fn current_pid(&self) -> Pid {
        getpid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_no_children() {
        let control = UnixProcessControl::new();
        assert!(control.children.is_empty());
    }

    #[test]
    fn test_current_pid_matches_std() {
        let control = UnixProcessControl::new();
        assert_eq!(control.current_pid().as_raw() as u32, std::process::id());
    }

    #[test]
    fn test_send_signal_to_missing_process_is_delivery_error() {
        let mut control = UnixProcessControl::new();
        // pid_max on Linux tops out well below i32::MAX
        let result = control.send_signal(Pid::from_raw(i32::MAX), Signal::SIGUSR1);

        assert!(matches!(
            result,
            Err(SignalError::Delivery { source: Errno::ESRCH, .. })
        ));
    }

    #[test]
    fn test_take_child_maps_pid() {
        let mut control = UnixProcessControl::new();
        control.children.push(ChildHandle::new(0, Pid::from_raw(11)));
        control.children.push(ChildHandle::new(1, Pid::from_raw(12)));

        assert_eq!(control.take_child(Pid::from_raw(12)).map(|c| c.index), Some(1));
        assert_eq!(control.take_child(Pid::from_raw(12)), None);
        assert_eq!(control.children.len(), 1);
    }
}
