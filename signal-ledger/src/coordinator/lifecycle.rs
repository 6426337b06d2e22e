/// Per-process lifecycle state machine
use crate::error::SignalError;
use crate::policy::ProcessRole;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// States every process in the tree walks through, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessState {
    Initializing,
    /// Configured signals ignored while the tree is being set up.
    SignalsIgnored,
    PolicyApplied,
    /// Workload running, drains polled.
    Running,
    SignalsRestoredToDefault,
    /// The single final sweep.
    Draining,
    Terminated,
}

impl ProcessState {
    /// The only state this one may move to.
    pub fn next(self) -> Option<ProcessState> {
        Self::iter().skip_while(|state| *state != self).nth(1)
    }
}

/// Enforces strictly sequential transitions for one process.
#[derive(Debug)]
pub struct ProcessLifecycle {
    role: ProcessRole,
    state: ProcessState,
}

impl ProcessLifecycle {
    pub fn new(role: ProcessRole) -> Self {
        Self {
            role,
            state: ProcessState::Initializing,
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Move to `to`, which must be the immediate successor.
    pub fn advance(&mut self, to: ProcessState) -> Result<(), SignalError> {
        if self.state.next() != Some(to) {
            return Err(SignalError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        log::debug!("{}: {} -> {}", self.role, self.state, to);
        self.state = to;
        Ok(())
    }
}
