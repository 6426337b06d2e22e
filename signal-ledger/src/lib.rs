#![deny(unsafe_op_in_unsafe_fn)]

//! Signal-safe event recording for small process trees.
//!
//! A handler installed with [`SignalHandler`] only touches atomics in a
//! process-wide [`SignalRecordTable`]; everything else (formatting,
//! timestamps, console output) happens later in a [`DeferredProcessor`]
//! drain. [`SignalMaskPolicy`] decides which signals are handled, blocked
//! or ignored per [`ProcessRole`], and [`ProcessGroupCoordinator`] drives a
//! parent and its forked children through the whole lifecycle.

pub mod coordinator;
mod error;
pub mod handler;
pub mod policy;
pub mod processor;
pub mod record;
pub mod stats;
mod util;
pub mod workload;

pub use crate::coordinator::{
    ChildExit, ChildHandle, CoordinatorConfig, ProcessControl, ProcessGroupCoordinator,
    ProcessLifecycle, ProcessState, RunReport, UnixProcessControl,
};
pub use crate::error::SignalError;
pub use crate::handler::{HandlerOutput, SignalHandler};
pub use crate::policy::{ChildPolicy, ProcessRole, RolePolicy, SignalMaskPolicy};
pub use crate::processor::{DeferredProcessor, SignalRecord};
pub use crate::record::{SignalRecordTable, SignalSlot, UNKNOWN_SENDER};
pub use crate::stats::{format_pending, pending_signals, SignalStats};
pub use crate::util::signal_name;
pub use crate::workload::{SendPlan, SendStep, Workload};

///
/// Expose everything needed to describe and run a process tree
///
/// ```
/// use signal_ledger::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChildPolicy, CoordinatorConfig, HandlerOutput, ProcessGroupCoordinator, ProcessRole,
        RolePolicy, SendPlan, SignalError, SignalMaskPolicy, Workload,
    };
    pub use nix::sys::signal::Signal;
}
