/// Wait loop for children, interleaved with drains
use crate::coordinator::control::{ChildHandle, ProcessControl};
use crate::coordinator::exit::ChildExit;
use crate::error::SignalError;
use std::thread;
use std::time::Duration;

/// Polls for exited children without blocking so that pending signals are
/// drained at bounded intervals instead of only at exit.
pub struct PollLoop {
    poll_interval: Duration,
}

impl PollLoop {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Drain, reap, sleep; until `outstanding` children have exited.
    pub fn wait_for_children<C, F>(
        &self,
        control: &mut C,
        mut outstanding: usize,
        mut drain: F,
    ) -> Result<Vec<(ChildHandle, ChildExit)>, SignalError>
    where
        C: ProcessControl,
        F: FnMut() -> Result<(), SignalError>,
    {
        let mut exited = Vec::with_capacity(outstanding);
        while outstanding > 0 {
            drain()?;
            match control.wait_any(true)? {
                Some((child, status)) => {
                    log::info!("{child} {status}");
                    exited.push((child, status));
                    outstanding -= 1;
                }
                None => thread::sleep(self.poll_interval),
            }
        }
        Ok(exited)
    }
}
