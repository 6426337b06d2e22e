use crate::error::SignalError;
use std::os::raw::c_int;

/// Name of a signal number, `SIG?` when the platform has none.
///
/// Backed by a static table, so it is also usable from handler context.
pub fn signal_name(signal: c_int) -> &'static str {
    signal_hook::low_level::signal_name(signal).unwrap_or("SIG?")
}

pub trait SetupContext<T> {
    fn setup_context<F>(self, action_fn: F) -> Result<T, SignalError>
    where
        F: FnOnce() -> String;
}

impl<T> SetupContext<T> for nix::Result<T> {
    fn setup_context<F>(self, action_fn: F) -> Result<T, SignalError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| SignalError::setup(action_fn(), source))
    }
}
