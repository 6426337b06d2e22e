/// Signal sets making up a policy
use nix::sys::signal::{SigSet, Signal};
use std::collections::BTreeSet;

/// Signal sets for one role.
///
/// - `handled`: gets the recording handler installed
/// - `always_blocked`: blocked for the whole life of the process
/// - `handler_masked`: blocked only while a handler runs
/// - `ignored`: disposition set to ignore
///
/// Sets are ordered by signal number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePolicy {
    handled: BTreeSet<Signal>,
    always_blocked: BTreeSet<Signal>,
    handler_masked: BTreeSet<Signal>,
    ignored: BTreeSet<Signal>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.handled.extend(signals);
        self
    }

    pub fn always_block(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.always_blocked.extend(signals);
        self
    }

    pub fn mask_during_handler(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.handler_masked.extend(signals);
        self
    }

    pub fn ignore(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.ignored.extend(signals);
        self
    }

    pub fn handled(&self) -> &BTreeSet<Signal> {
        &self.handled
    }

    pub fn always_blocked(&self) -> &BTreeSet<Signal> {
        &self.always_blocked
    }

    pub fn handler_masked(&self) -> &BTreeSet<Signal> {
        &self.handler_masked
    }

    pub fn ignored(&self) -> &BTreeSet<Signal> {
        &self.ignored
    }

    /// Every signal this role touches, ascending.
    pub fn configured(&self) -> BTreeSet<Signal> {
        self.handled
            .iter()
            .chain(&self.always_blocked)
            .chain(&self.handler_masked)
            .chain(&self.ignored)
            .copied()
            .collect()
    }

    /// Union of two policies. Used to layer child settings over the base.
    pub(crate) fn merged(&self, other: &RolePolicy) -> RolePolicy {
        let mut merged = self.clone();
        merged.handled.extend(&other.handled);
        merged.always_blocked.extend(&other.always_blocked);
        merged.handler_masked.extend(&other.handler_masked);
        merged.ignored.extend(&other.ignored);
        merged
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for signal in self.configured() {
            if matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
                return Err(format!("{signal} cannot be caught, blocked or ignored"));
            }
        }
        if let Some(signal) = self.always_blocked.intersection(&self.handler_masked).next() {
            return Err(format!(
                "{signal} is both always blocked and masked only during handlers"
            ));
        }
        if let Some(signal) = self.ignored.intersection(&self.handled).next() {
            return Err(format!("{signal} is both handled and ignored"));
        }
        if self.ignored.contains(&Signal::SIGCHLD) {
            return Err("SIGCHLD cannot be ignored: that turns on automatic child reaping".into());
        }
        Ok(())
    }
}

/// Per-child additions on top of the children's base policy.
///
/// A child can only add to what it blocks, never remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPolicy {
    extra: RolePolicy,
}

impl ChildPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.extra = self.extra.always_block(signals);
        self
    }

    pub fn handle(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.extra = self.extra.handle(signals);
        self
    }

    pub(crate) fn as_role_policy(&self) -> &RolePolicy {
        &self.extra
    }
}

pub(crate) fn to_sigset(signals: &BTreeSet<Signal>) -> SigSet {
    let mut set = SigSet::empty();
    for signal in signals {
        set.add(*signal);
    }
    set
}

pub(crate) fn describe(signals: &BTreeSet<Signal>) -> String {
    if signals.is_empty() {
        return "nothing".to_string();
    }
    signals
        .iter()
        .map(|signal| signal.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use Signal::*;

    #[test]
    fn test_builder_collects_sets() {
        let policy = RolePolicy::new()
            .handle([SIGINT, SIGABRT])
            .always_block([SIGFPE])
            .mask_during_handler([SIGTSTP])
            .ignore([SIGTRAP]);

        assert_eq!(policy.handled().len(), 2);
        assert!(policy.always_blocked().contains(&SIGFPE));
        assert!(policy.handler_masked().contains(&SIGTSTP));
        assert!(policy.ignored().contains(&SIGTRAP));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_configured_is_sorted_union() {
        let policy = RolePolicy::new()
            .handle([SIGSEGV, SIGINT])
            .always_block([SIGHUP])
            .mask_during_handler([SIGINT]);

        let configured: Vec<Signal> = policy.configured().into_iter().collect();
        assert_eq!(configured, vec![SIGHUP, SIGINT, SIGSEGV]);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let blocked_and_masked = RolePolicy::new()
            .always_block([SIGHUP])
            .mask_during_handler([SIGHUP]);
        assert!(blocked_and_masked.validate().is_err());

        let handled_and_ignored = RolePolicy::new().handle([SIGINT]).ignore([SIGINT]);
        assert!(handled_and_ignored.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_uncatchable() {
        assert!(RolePolicy::new().handle([SIGKILL]).validate().is_err());
        assert!(RolePolicy::new().always_block([SIGSTOP]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ignored_sigchld() {
        let err = RolePolicy::new().ignore([SIGCHLD]).validate();
        assert!(err.is_err_and(|msg| msg.contains("SIGCHLD")));
    }

    #[test]
    fn test_blocked_and_handled_is_allowed() {
        // held back until the block is lifted, then handled
        let policy = RolePolicy::new().handle([SIGINT]).always_block([SIGINT]);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_merged_only_adds() {
        let base = RolePolicy::new().handle([SIGINT]).always_block([SIGHUP]);
        let extra = ChildPolicy::new().block([SIGFPE]).handle([SIGILL]);
        let merged = base.merged(extra.as_role_policy());

        assert!(merged.always_blocked().contains(&SIGHUP));
        assert!(merged.always_blocked().contains(&SIGFPE));
        assert!(merged.handled().contains(&SIGINT));
        assert!(merged.handled().contains(&SIGILL));
    }

    #[test]
    fn test_to_sigset() {
        let set = to_sigset(&BTreeSet::from([SIGCHLD, SIGTSTP]));
        assert!(set.contains(SIGCHLD));
        assert!(set.contains(SIGTSTP));
        assert!(!set.contains(SIGINT));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&BTreeSet::new()), "nothing");
        assert_eq!(describe(&BTreeSet::from([SIGTSTP, SIGINT])), "SIGINT,SIGTSTP");
    }
}
