//! Which signals are handled, ignored or blocked, per process role.
//!
//! - `role`: parent vs. child identity
//! - `sets`: the per-role signal sets and the child extensions
//! - `mask`: the policy itself and the operations that push it into the OS

pub mod mask;
pub mod role;
pub mod sets;

pub use mask::SignalMaskPolicy;
pub use role::ProcessRole;
pub use sets::{ChildPolicy, RolePolicy};
