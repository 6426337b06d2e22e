//! Process tree orchestration
//!
//! The coordinator is the main caller of the core: it spawns children,
//! applies each process's signal policy, polls drains while it waits, and
//! runs the shutdown sequence. The main components are:
//!
//! - `control`: the spawn/wait/send surface, mockable in tests
//! - `unix`: `fork`/`waitpid`/`kill` implementation of that surface
//! - `lifecycle`: the per-process state machine
//! - `event_loop`: the non-blocking wait loop interleaved with drains
//! - `core`: the coordinator itself

pub mod control;
pub mod core;
pub mod event_loop;
pub mod exit;
pub mod lifecycle;
pub mod unix;

pub use self::core::{
    CoordinatorConfig, ProcessGroupCoordinator, RunReport, DEFAULT_POLL_INTERVAL,
    DEFAULT_TAIL_WINDOW,
};
pub use control::{ChildBody, ChildHandle, ProcessControl};
pub use exit::ChildExit;
pub use lifecycle::{ProcessLifecycle, ProcessState};
pub use unix::UnixProcessControl;

#[cfg(test)]
pub use control::MockProcessControl;
