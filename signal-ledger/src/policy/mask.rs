/// The signal mask policy for a whole process tree
use crate::error::SignalError;
use crate::handler::SignalHandler;
use crate::policy::role::ProcessRole;
use crate::policy::sets::{describe, to_sigset, ChildPolicy, RolePolicy};
use crate::util::SetupContext;
use nix::sys::signal::{
    pthread_sigmask, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use std::collections::{BTreeMap, BTreeSet};

/// Describes, for every role in the tree, which signals are handled,
/// ignored, blocked for good, or blocked only while a handler runs.
///
/// Children inherit the parent's always-blocked set and may extend it, so a
/// child is never less isolated than its parent.
///
/// # Example
///
/// ```
/// use nix::sys::signal::Signal::*;
/// use signal_ledger::policy::{ChildPolicy, RolePolicy, SignalMaskPolicy};
///
/// let policy = SignalMaskPolicy::new()
///     .parent(RolePolicy::new().handle([SIGINT, SIGHUP]))
///     .children(
///         RolePolicy::new()
///             .handle([SIGINT, SIGABRT])
///             .always_block([SIGFPE, SIGHUP])
///             .mask_during_handler([SIGCHLD, SIGTSTP]),
///     )
///     .for_child(2, ChildPolicy::new().block([SIGILL]));
///
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalMaskPolicy {
    parent: RolePolicy,
    children: RolePolicy,
    per_child: BTreeMap<usize, ChildPolicy>,
}

impl SignalMaskPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, policy: RolePolicy) -> Self {
        self.parent = policy;
        self
    }

    /// Base policy shared by every child.
    pub fn children(mut self, policy: RolePolicy) -> Self {
        self.children = policy;
        self
    }

    pub fn for_child(mut self, index: usize, policy: ChildPolicy) -> Self {
        self.per_child.insert(index, policy);
        self
    }

    /// The sets actually applied in a process with this role.
    pub fn for_role(&self, role: ProcessRole) -> RolePolicy {
        match role {
            ProcessRole::Parent => self.parent.clone(),
            ProcessRole::Child(index) => {
                let inherited =
                    RolePolicy::new().always_block(self.parent.always_blocked().iter().copied());
                let base = inherited.merged(&self.children);
                match self.per_child.get(&index) {
                    Some(extra) => base.merged(extra.as_role_policy()),
                    None => base,
                }
            }
        }
    }

    /// Signals whose disposition a process with this role changes.
    ///
    /// The parent also owns everything its children configure, since it
    /// ignores all of them while spawning.
    pub fn configured_signals(&self, role: ProcessRole) -> BTreeSet<Signal> {
        match role {
            ProcessRole::Parent => {
                let mut all = self.parent.configured();
                all.extend(self.children.configured());
                for extra in self.per_child.values() {
                    all.extend(extra.as_role_policy().configured());
                }
                all
            }
            ProcessRole::Child(_) => self.for_role(role).configured(),
        }
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        self.parent
            .validate()
            .map_err(|msg| SignalError::InvalidPolicy(format!("parent: {msg}")))?;
        // any index without an extension sees the plain base policy
        self.for_role(ProcessRole::Child(usize::MAX))
            .validate()
            .map_err(|msg| SignalError::InvalidPolicy(format!("children: {msg}")))?;
        for index in self.per_child.keys() {
            let role = ProcessRole::Child(*index);
            self.for_role(role)
                .validate()
                .map_err(|msg| SignalError::InvalidPolicy(format!("{role}: {msg}")))?;
        }
        Ok(())
    }

    /// Ignore every configured signal while the parent spawns children.
    ///
    /// SIGCHLD keeps its default disposition: it is discarded by default
    /// anyway, and ignoring it explicitly would reap children behind our
    /// back.
    pub fn bootstrap_ignore(&self) -> Result<(), SignalError> {
        let signals: BTreeSet<Signal> = self
            .configured_signals(ProcessRole::Parent)
            .into_iter()
            .filter(|signal| *signal != Signal::SIGCHLD)
            .collect();
        log::debug!("bootstrap: ignoring {}", describe(&signals));
        for signal in signals {
            set_disposition(signal, SigHandler::SigIgn)?;
        }
        Ok(())
    }

    /// Push the role's policy into the OS. Safe to call more than once.
    pub fn apply(&self, role: ProcessRole, handler: &SignalHandler) -> Result<(), SignalError> {
        let effective = self.for_role(role);
        effective
            .validate()
            .map_err(|msg| SignalError::InvalidPolicy(format!("{role}: {msg}")))?;

        let blocked = effective.always_blocked();
        if !blocked.is_empty() {
            pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&to_sigset(blocked)), None)
                .setup_context(|| format!("block {} for {role}", describe(blocked)))?;
        }

        for signal in effective.ignored() {
            set_disposition(*signal, SigHandler::SigIgn)?;
        }

        let handler_mask = to_sigset(effective.handler_masked());
        for signal in effective.handled() {
            handler.install(*signal, &handler_mask)?;
        }

        log::debug!(
            "{role}: handling {}, always blocking {}, masking {} during handlers, ignoring {}",
            describe(effective.handled()),
            describe(blocked),
            describe(effective.handler_masked()),
            describe(effective.ignored()),
        );
        Ok(())
    }

    /// Give every configured signal back its default disposition.
    ///
    /// From here on deliveries are no longer recorded: they get whatever
    /// the OS does by default, which may terminate the process.
    pub fn restore_defaults(&self, role: ProcessRole) -> Result<(), SignalError> {
        let signals = self.configured_signals(role);
        for signal in &signals {
            set_disposition(*signal, SigHandler::SigDfl)?;
        }
        log::debug!("{role}: restored default disposition for {}", describe(&signals));
        Ok(())
    }

    /// Unblock the role's always-blocked set. Pending deliveries of those
    /// signals arrive as soon as this returns.
    pub fn lift_blocks(&self, role: ProcessRole) -> Result<(), SignalError> {
        let effective = self.for_role(role);
        let blocked = effective.always_blocked();
        if blocked.is_empty() {
            return Ok(());
        }
        pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&to_sigset(blocked)), None)
            .setup_context(|| format!("unblock {} for {role}", describe(blocked)))?;
        log::debug!("{role}: lifted block on {}", describe(blocked));
        Ok(())
    }
}

fn set_disposition(signal: Signal, handler: SigHandler) -> Result<(), SignalError> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    // SAFETY: only SIG_IGN and SIG_DFL are installed here, no Rust code
    // runs in signal context as a result.
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .setup_context(|| match handler {
            SigHandler::SigIgn => format!("ignore {signal}"),
            _ => format!("restore default disposition of {signal}"),
        })
}
