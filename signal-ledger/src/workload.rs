//! Work a child does between applying its policy and shutting down.
//!
//! Every workload calls back into the owner's drain at each step, which is
//! what keeps pending signals serviced while the child is busy.

use crate::coordinator::ProcessControl;
use crate::error::SignalError;
use crate::policy::ProcessRole;
use crate::stats::{format_pending, pending_signals};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::thread;
use std::time::Duration;

/// Gap between repeated sends of the same signal.
pub const DEFAULT_REPEAT_GAP: Duration = Duration::from_millis(50);

/// One signal sent `times` times in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendStep {
    pub signal: Signal,
    pub times: usize,
}

/// A sequence of signals a child sends to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPlan {
    pub initial_delay: Duration,
    pub steps: Vec<SendStep>,
    pub repeat_gap: Duration,
    /// Wait after every step.
    pub pause: Duration,
}

impl SendPlan {
    /// Every signal once, then every signal `times` times.
    pub fn once_then_repeat(signals: &[Signal], times: usize) -> Self {
        let once = signals.iter().map(|signal| SendStep {
            signal: *signal,
            times: 1,
        });
        let repeated = signals.iter().map(|signal| SendStep {
            signal: *signal,
            times,
        });
        SendPlan {
            initial_delay: Duration::ZERO,
            steps: once.chain(repeated).collect(),
            repeat_gap: DEFAULT_REPEAT_GAP,
            pause: Duration::from_secs(1),
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn repeat_gap(mut self, gap: Duration) -> Self {
        self.repeat_gap = gap;
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Total number of signals the plan sends.
    pub fn total(&self) -> usize {
        self.steps.iter().map(|step| step.times).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    /// Sum `0..=limit`, one term per step.
    Sum { limit: u64, step: Duration },
    SendSignals(SendPlan),
    /// Report the pending set, sleep while draining every `poll`, report
    /// again.
    Idle { duration: Duration, poll: Duration },
}

/// What a running workload may touch.
pub struct WorkloadContext<'a, C: ProcessControl> {
    pub role: ProcessRole,
    pub parent: Pid,
    pub control: &'a mut C,
    pub poll: &'a mut dyn FnMut() -> Result<(), SignalError>,
}

impl Workload {
    /// Run to completion and return the process exit code.
    pub fn run<C: ProcessControl>(
        &self,
        ctx: &mut WorkloadContext<'_, C>,
    ) -> Result<i32, SignalError> {
        match self {
            Workload::Sum { limit, step } => sum(*limit, *step, ctx),
            Workload::SendSignals(plan) => send(plan, ctx),
            Workload::Idle { duration, poll } => idle(*duration, *poll, ctx),
        }
    }
}

fn sum<C: ProcessControl>(
    limit: u64,
    step: Duration,
    ctx: &mut WorkloadContext<'_, C>,
) -> Result<i32, SignalError> {
    log::info!("{} will compute sum from 0 to {limit}", ctx.role);
    let mut total: u64 = 0;
    for k in 0..=limit {
        total = total.saturating_add(k);
        log::info!("{}: k={k:2}, sum={total:10}", ctx.role);
        (ctx.poll)()?;
        thread::sleep(step);
    }
    log::info!("{} done, final sum={total}", ctx.role);
    Ok(0)
}

fn send<C: ProcessControl>(
    plan: &SendPlan,
    ctx: &mut WorkloadContext<'_, C>,
) -> Result<i32, SignalError> {
    log::info!(
        "{} will send {} signals to parent (pid={})",
        ctx.role,
        plan.total(),
        ctx.parent
    );
    thread::sleep(plan.initial_delay);

    for step in &plan.steps {
        for n in 1..=step.times {
            if n > 1 {
                thread::sleep(plan.repeat_gap);
            }
            log::info!(
                "{} sending {} to pid {} ({n} of {})",
                ctx.role,
                step.signal,
                ctx.parent,
                step.times
            );
            match ctx.control.send_signal(ctx.parent, step.signal) {
                Ok(()) => {}
                Err(err) if !err.is_fatal() => log::warn!("{}: {err}", ctx.role),
                Err(err) => return Err(err),
            }
        }
        (ctx.poll)()?;
        thread::sleep(plan.pause);
    }
    Ok(0)
}

fn idle<C: ProcessControl>(
    duration: Duration,
    poll: Duration,
    ctx: &mut WorkloadContext<'_, C>,
) -> Result<i32, SignalError> {
    let pid = ctx.control.current_pid();
    let tag = ctx.role.to_string();
    let before = pending_signals()?;
    log::info!("{}", format_pending(&format!("{tag} before sleep"), pid, &before));

    let mut remaining = duration;
    while !remaining.is_zero() {
        (ctx.poll)()?;
        // A zero poll interval means one nap for the whole duration.
        let nap = if poll.is_zero() {
            remaining
        } else {
            remaining.min(poll)
        };
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
    (ctx.poll)()?;

    let after = pending_signals()?;
    log::info!("{}", format_pending(&format!("{tag} after sleep"), pid, &after));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::MockProcessControl;
    use mockall::predicate::eq;
    use nix::errno::Errno;

    fn run_with(
        workload: &Workload,
        mock: &mut MockProcessControl,
    ) -> (Result<i32, SignalError>, usize) {
        let mut polls = 0;
        let mut poll = || -> Result<(), SignalError> {
            polls += 1;
            Ok(())
        };
        let result = workload.run(&mut WorkloadContext {
            role: ProcessRole::Child(2),
            parent: Pid::from_raw(77),
            control: mock,
            poll: &mut poll,
        });
        (result, polls)
    }

    fn quick(plan: SendPlan) -> SendPlan {
        plan.repeat_gap(Duration::ZERO).pause(Duration::ZERO)
    }

    #[test]
    fn test_once_then_repeat() {
        let plan = SendPlan::once_then_repeat(&[Signal::SIGINT, Signal::SIGHUP], 3);

        let steps: Vec<_> = plan.steps.iter().map(|s| (s.signal, s.times)).collect();
        assert_eq!(
            steps,
            vec![
                (Signal::SIGINT, 1),
                (Signal::SIGHUP, 1),
                (Signal::SIGINT, 3),
                (Signal::SIGHUP, 3),
            ]
        );
        assert_eq!(plan.total(), 8);
        assert_eq!(plan.repeat_gap, DEFAULT_REPEAT_GAP);
    }

    #[test]
    fn test_sum_polls_every_step() {
        let mut mock = MockProcessControl::new();
        let workload = Workload::Sum {
            limit: 4,
            step: Duration::ZERO,
        };

        let (result, polls) = run_with(&workload, &mut mock);

        assert_eq!(result.unwrap(), 0);
        assert_eq!(polls, 5);
    }

    #[test]
    fn test_send_signals_targets_parent() {
        let mut mock = MockProcessControl::new();
        mock.expect_send_signal()
            .with(eq(Pid::from_raw(77)), eq(Signal::SIGUSR1))
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_send_signal()
            .with(eq(Pid::from_raw(77)), eq(Signal::SIGUSR2))
            .times(3)
            .returning(|_, _| Ok(()));

        let plan = SendPlan {
            initial_delay: Duration::ZERO,
            steps: vec![
                SendStep {
                    signal: Signal::SIGUSR1,
                    times: 1,
                },
                SendStep {
                    signal: Signal::SIGUSR2,
                    times: 3,
                },
            ],
            repeat_gap: Duration::ZERO,
            pause: Duration::ZERO,
        };

        let (result, polls) = run_with(&Workload::SendSignals(plan), &mut mock);

        assert_eq!(result.unwrap(), 0);
        assert_eq!(polls, 2, "one drain per step");
    }

    #[test]
    fn test_send_signals_skips_delivery_failures() {
        let mut mock = MockProcessControl::new();
        mock.expect_send_signal().times(4).returning(|target, signal| {
            Err(SignalError::Delivery {
                signal,
                target,
                source: Errno::ESRCH,
            })
        });

        let plan = quick(SendPlan::once_then_repeat(&[Signal::SIGTERM], 3));
        let (result, _) = run_with(&Workload::SendSignals(plan), &mut mock);

        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn test_send_signals_stops_on_fatal_error() {
        let mut mock = MockProcessControl::new();
        mock.expect_send_signal()
            .times(1)
            .returning(|_, _| Err(SignalError::process("send", Errno::EPERM)));

        let plan = quick(SendPlan::once_then_repeat(&[Signal::SIGTERM], 3));
        let (result, polls) = run_with(&Workload::SendSignals(plan), &mut mock);

        assert!(matches!(result, Err(SignalError::Process { .. })));
        assert_eq!(polls, 0);
    }

    #[test]
    fn test_poll_error_stops_workload() {
        let mut mock = MockProcessControl::new();
        let workload = Workload::Sum {
            limit: 10,
            step: Duration::ZERO,
        };
        let mut calls = 0;
        let mut poll = || -> Result<(), SignalError> {
            calls += 1;
            Err(SignalError::Io(std::io::Error::other("closed")))
        };

        let result = workload.run(&mut WorkloadContext {
            role: ProcessRole::Child(0),
            parent: Pid::from_raw(1),
            control: &mut mock,
            poll: &mut poll,
        });

        assert!(matches!(result, Err(SignalError::Io(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_idle_drains_while_sleeping() {
        let mut mock = MockProcessControl::new();
        mock.expect_current_pid().returning(|| Pid::from_raw(5));
        let workload = Workload::Idle {
            duration: Duration::from_millis(30),
            poll: Duration::from_millis(10),
        };

        let (result, polls) = run_with(&workload, &mut mock);

        assert_eq!(result.unwrap(), 0);
        assert_eq!(polls, 4);
    }

    #[test]
    fn test_idle_with_zero_poll_finishes() {
        let mut mock = MockProcessControl::new();
        mock.expect_current_pid().returning(|| Pid::from_raw(5));
        let workload = Workload::Idle {
            duration: Duration::from_millis(10),
            poll: Duration::ZERO,
        };

        let (result, polls) = run_with(&workload, &mut mock);

        assert_eq!(result.unwrap(), 0);
        assert_eq!(polls, 2);
    }
}
