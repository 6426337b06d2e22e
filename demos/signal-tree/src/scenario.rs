//! The three process trees the binary knows how to run.

use crate::cli::{Args, ScenarioKind};
use signal_ledger::prelude::*;
use std::time::Duration;

const ALL_EIGHT: [Signal; 8] = [
    Signal::SIGINT,
    Signal::SIGABRT,
    Signal::SIGILL,
    Signal::SIGCHLD,
    Signal::SIGSEGV,
    Signal::SIGFPE,
    Signal::SIGHUP,
    Signal::SIGTSTP,
];

const CHILD_HANDLED: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGABRT,
    Signal::SIGILL,
    Signal::SIGSEGV,
];
const CHILD_BLOCKED: [Signal; 2] = [Signal::SIGFPE, Signal::SIGHUP];
const HANDLER_MASKED: [Signal; 2] = [Signal::SIGCHLD, Signal::SIGTSTP];

const CHILD3_SENDS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGILL,
    Signal::SIGHUP,
    Signal::SIGTSTP,
];

const BLOCKING_HANDLED: [Signal; 9] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGABRT,
    Signal::SIGILL,
    Signal::SIGCHLD,
    Signal::SIGSEGV,
    Signal::SIGFPE,
    Signal::SIGHUP,
];
const BLOCKING_PARENT_BLOCKED: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTSTP];
const BLOCKING_SECOND_HALF: [Signal; 6] = [
    Signal::SIGABRT,
    Signal::SIGILL,
    Signal::SIGCHLD,
    Signal::SIGSEGV,
    Signal::SIGFPE,
    Signal::SIGHUP,
];

/// Signal lists a scenario starts from; each one can be replaced from the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignalLists {
    handle: Vec<Signal>,
    block: Vec<Signal>,
    mask: Vec<Signal>,
    ignore: Vec<Signal>,
}

impl SignalLists {
    fn overridden_by(self, args: &Args) -> Self {
        let pick = |own: Vec<Signal>, cli: &Vec<Signal>| {
            if cli.is_empty() {
                own
            } else {
                cli.clone()
            }
        };
        SignalLists {
            handle: pick(self.handle, &args.handle),
            block: pick(self.block, &args.block),
            mask: pick(self.mask, &args.mask),
            ignore: pick(self.ignore, &args.ignore),
        }
    }

    fn role_policy(&self) -> RolePolicy {
        RolePolicy::new()
            .handle(self.handle.iter().copied())
            .always_block(self.block.iter().copied())
            .mask_during_handler(self.mask.iter().copied())
            .ignore(self.ignore.iter().copied())
    }
}

/// A fully described run.
#[derive(Debug)]
pub struct Plan {
    pub policy: SignalMaskPolicy,
    pub workloads: Vec<Workload>,
    pub report_pending: bool,
}

pub fn build(args: &Args) -> Plan {
    match args.scenario {
        ScenarioKind::Summing => summing(args),
        ScenarioKind::Messaging => messaging(args),
        ScenarioKind::Blocking => blocking(args),
    }
}

fn child_lists() -> SignalLists {
    SignalLists {
        handle: CHILD_HANDLED.to_vec(),
        block: CHILD_BLOCKED.to_vec(),
        mask: HANDLER_MASKED.to_vec(),
        ignore: Vec::new(),
    }
}

fn sum_workload(index: usize, step: Duration) -> Workload {
    Workload::Sum {
        limit: 10 * (index as u64 + 1),
        step,
    }
}

/// Every child handles, blocks and masks signals while it sums; the parent
/// only waits.
fn summing(args: &Args) -> Plan {
    let children = child_lists().overridden_by(args);
    Plan {
        policy: SignalMaskPolicy::new().children(children.role_policy()),
        workloads: (0..args.children)
            .map(|index| sum_workload(index, args.step()))
            .collect(),
        report_pending: false,
    }
}

/// The parent handles all eight signals; children 2 and 3 send them.
fn messaging(args: &Args) -> Plan {
    let parent = SignalLists {
        handle: ALL_EIGHT.to_vec(),
        block: Vec::new(),
        mask: HANDLER_MASKED.to_vec(),
        ignore: Vec::new(),
    }
    .overridden_by(args);

    let workloads = (0..args.children)
        .map(|index| match index {
            2 => Workload::SendSignals(
                SendPlan::once_then_repeat(&parent.handle, 3).initial_delay(Duration::from_secs(5)),
            ),
            3 => Workload::SendSignals(
                SendPlan::once_then_repeat(&CHILD3_SENDS, 3)
                    .initial_delay(Duration::from_secs(20)),
            ),
            _ => sum_workload(index, args.step()),
        })
        .collect();

    Plan {
        policy: SignalMaskPolicy::new()
            .parent(parent.role_policy())
            .children(child_lists().role_policy()),
        workloads,
        report_pending: false,
    }
}

/// The parent blocks INT, QUIT and TSTP for good; the second half of the
/// children block six more and every child idles, reporting what is
/// pending.
fn blocking(args: &Args) -> Plan {
    let lists = SignalLists {
        handle: BLOCKING_HANDLED.to_vec(),
        block: BLOCKING_PARENT_BLOCKED.to_vec(),
        mask: Vec::new(),
        ignore: vec![Signal::SIGTRAP],
    }
    .overridden_by(args);

    let children = RolePolicy::new()
        .handle(lists.handle.iter().copied())
        .ignore(lists.ignore.iter().copied());
    let mut policy = SignalMaskPolicy::new()
        .parent(lists.role_policy())
        .children(children);
    for index in (args.children / 2)..args.children {
        policy = policy.for_child(index, ChildPolicy::new().block(BLOCKING_SECOND_HALF));
    }

    Plan {
        policy,
        workloads: (0..args.children)
            .map(|_| Workload::Idle {
                duration: Duration::from_secs(10),
                poll: args.poll_interval(),
            })
            .collect(),
        report_pending: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("signal-tree").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_summing_children_policy() {
        let plan = build(&args(&["summing"]));
        let child = plan.policy.for_role(ProcessRole::Child(1));

        assert!(child.handled().contains(&Signal::SIGSEGV));
        assert!(child.always_blocked().contains(&Signal::SIGFPE));
        assert!(child.handler_masked().contains(&Signal::SIGTSTP));
        assert!(plan.policy.for_role(ProcessRole::Parent).handled().is_empty());
        assert_eq!(
            plan.workloads[1],
            Workload::Sum {
                limit: 20,
                step: Duration::from_secs(1)
            }
        );
        assert!(plan.policy.validate().is_ok());
    }

    #[test]
    fn test_messaging_senders() {
        let plan = build(&args(&["messaging"]));

        assert_eq!(plan.policy.for_role(ProcessRole::Parent).handled().len(), 8);
        match &plan.workloads[2] {
            Workload::SendSignals(send) => assert_eq!(send.total(), 32),
            other => panic!("child 2 runs {other:?}"),
        }
        match &plan.workloads[3] {
            Workload::SendSignals(send) => assert_eq!(send.total(), 16),
            other => panic!("child 3 runs {other:?}"),
        }
        assert!(plan.policy.validate().is_ok());
    }

    #[test]
    fn test_blocking_second_half_blocks_more() {
        let plan = build(&args(&["blocking"]));

        let first = plan.policy.for_role(ProcessRole::Child(0));
        let last = plan.policy.for_role(ProcessRole::Child(3));
        assert_eq!(first.always_blocked().len(), 3);
        assert_eq!(last.always_blocked().len(), 9);
        assert!(plan.report_pending);
        assert!(plan.policy.validate().is_ok());
    }

    #[test]
    fn test_cli_lists_override() {
        let plan = build(&args(&["summing", "--handle", "USR1,USR2", "--block", "TERM"]));
        let child = plan.policy.for_role(ProcessRole::Child(0));

        assert_eq!(child.handled().len(), 2);
        assert!(child.always_blocked().contains(&Signal::SIGTERM));
        assert!(child.handler_masked().contains(&Signal::SIGCHLD));
    }
}
