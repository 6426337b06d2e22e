/// Parent and child sides of a process tree run
use crate::coordinator::control::{ChildBody, ChildHandle, ProcessControl};
use crate::coordinator::event_loop::PollLoop;
use crate::coordinator::exit::ChildExit;
use crate::coordinator::lifecycle::{ProcessLifecycle, ProcessState};
use crate::coordinator::unix::UnixProcessControl;
use crate::error::SignalError;
use crate::handler::{HandlerOutput, SignalHandler};
use crate::policy::{ProcessRole, SignalMaskPolicy};
use crate::processor::{DeferredProcessor, SignalRecord};
use crate::record::SignalRecordTable;
use crate::stats::{format_pending, pending_signals, SignalStats};
use crate::workload::{Workload, WorkloadContext};
use nix::unistd::Pid;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TAIL_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Sleep between non-blocking waits, which bounds drain latency.
    pub poll_interval: Duration,
    /// How long the parent stays alive with default dispositions restored.
    pub tail_window: Duration,
    /// Unblock always-blocked signals before restoring defaults, so that
    /// held deliveries still reach the handler.
    pub lift_blocks_on_shutdown: bool,
    pub handler_output: HandlerOutput,
    /// Print the pending set once the policy is applied.
    pub report_pending: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            tail_window: DEFAULT_TAIL_WINDOW,
            lift_blocks_on_shutdown: false,
            handler_output: HandlerOutput::stdout(),
            report_pending: false,
        }
    }
}

/// What the parent saw by the time it terminated.
#[derive(Debug)]
pub struct RunReport {
    /// Children in the order they were reaped.
    pub children: Vec<(ChildHandle, ChildExit)>,
    pub stats: SignalStats,
    /// Every record the parent drained.
    pub records: Vec<SignalRecord>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.children.iter().all(|(_, exit)| exit.success())
    }
}

/// Spawns one child per workload and observes signals until they are done.
pub struct ProcessGroupCoordinator<C: ProcessControl = UnixProcessControl, W: Write = io::Stdout> {
    control: C,
    policy: SignalMaskPolicy,
    config: CoordinatorConfig,
    table: &'static SignalRecordTable,
    sink: W,
}

impl ProcessGroupCoordinator {
    /// A coordinator that forks real children and prints to stdout.
    pub fn new(policy: SignalMaskPolicy, config: CoordinatorConfig) -> Self {
        Self::with_control(
            policy,
            config,
            UnixProcessControl::new(),
            io::stdout(),
            SignalRecordTable::leak(),
        )
    }
}

impl<C: ProcessControl, W: Write> ProcessGroupCoordinator<C, W> {
    pub fn with_control(
        policy: SignalMaskPolicy,
        config: CoordinatorConfig,
        control: C,
        sink: W,
        table: &'static SignalRecordTable,
    ) -> Self {
        Self {
            control,
            policy,
            config,
            table,
            sink,
        }
    }

    pub fn policy(&self) -> &SignalMaskPolicy {
        &self.policy
    }

    pub fn table(&self) -> &'static SignalRecordTable {
        self.table
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Run the whole tree: one child per workload, index order.
    pub fn run(&mut self, workloads: Vec<Workload>) -> Result<RunReport, SignalError> {
        self.policy.validate()?;

        let role = ProcessRole::Parent;
        let mut lifecycle = ProcessLifecycle::new(role);
        let pid = self.control.current_pid();

        self.policy.bootstrap_ignore()?;
        lifecycle.advance(ProcessState::SignalsIgnored)?;

        let spawned = workloads.len();
        writeln!(self.sink, "Parent (pid={pid}) started, spawning {spawned} children")?;
        for (index, workload) in workloads.into_iter().enumerate() {
            let body = child_body(
                index,
                workload,
                pid,
                self.policy.clone(),
                self.config.clone(),
                self.table,
            );
            self.control.spawn(index, body)?;
        }

        let handler = SignalHandler::new(self.table, self.config.handler_output);
        self.policy.apply(role, &handler)?;
        lifecycle.advance(ProcessState::PolicyApplied)?;
        if self.config.report_pending {
            writeln!(self.sink, "{}", format_pending("Parent", pid, &pending_signals()?))?;
        }

        lifecycle.advance(ProcessState::Running)?;
        writeln!(self.sink, "Parent waiting for children (kill -SIGNAL {pid})")?;
        let mut records = Vec::new();
        let mut processor = DeferredProcessor::new(self.table, &mut self.sink, role, pid);
        let children = PollLoop::new(self.config.poll_interval).wait_for_children(
            &mut self.control,
            spawned,
            || {
                records.extend(processor.drain()?);
                Ok(())
            },
        )?;

        if self.config.lift_blocks_on_shutdown {
            self.policy.lift_blocks(role)?;
        }
        self.policy.restore_defaults(role)?;
        lifecycle.advance(ProcessState::SignalsRestoredToDefault)?;
        log::info!(
            "children done; defaults restored, lingering for {:?}",
            self.config.tail_window
        );
        thread::sleep(self.config.tail_window);

        lifecycle.advance(ProcessState::Draining)?;
        records.extend(processor.drain()?);
        lifecycle.advance(ProcessState::Terminated)?;

        let stats = SignalStats::collect(self.table);
        writeln!(self.sink, "{stats}")?;
        self.sink.flush()?;

        Ok(RunReport {
            children,
            stats,
            records,
        })
    }
}

fn child_body(
    index: usize,
    workload: Workload,
    parent: Pid,
    policy: SignalMaskPolicy,
    config: CoordinatorConfig,
    table: &'static SignalRecordTable,
) -> ChildBody {
    Box::new(move || {
        let role = ProcessRole::Child(index);
        match run_child(role, &workload, parent, &policy, &config, table) {
            Ok(code) => code,
            Err(err) => {
                log::error!("{role}: {err}");
                1
            }
        }
    })
}

/// The child's side of the lifecycle, run right after fork.
fn run_child(
    role: ProcessRole,
    workload: &Workload,
    parent: Pid,
    policy: &SignalMaskPolicy,
    config: &CoordinatorConfig,
    table: &'static SignalRecordTable,
) -> Result<i32, SignalError> {
    // the copy inherited from the parent starts over
    table.reset();
    let mut lifecycle = ProcessLifecycle::new(role);
    // dispositions ignored by the parent survive fork
    lifecycle.advance(ProcessState::SignalsIgnored)?;

    let mut control = UnixProcessControl::new();
    let pid = control.current_pid();
    let mut out = io::stdout();
    writeln!(out, "{role} (pid={pid}) starting")?;

    policy.apply(role, &SignalHandler::new(table, config.handler_output))?;
    lifecycle.advance(ProcessState::PolicyApplied)?;
    if config.report_pending {
        writeln!(out, "{}", format_pending(&role.to_string(), pid, &pending_signals()?))?;
    }

    lifecycle.advance(ProcessState::Running)?;
    let mut processor = DeferredProcessor::new(table, out, role, pid);
    let code = {
        let mut poll = || processor.drain().map(drop);
        workload.run(&mut WorkloadContext {
            role,
            parent,
            control: &mut control,
            poll: &mut poll,
        })?
    };

    if config.lift_blocks_on_shutdown {
        policy.lift_blocks(role)?;
    }
    policy.restore_defaults(role)?;
    lifecycle.advance(ProcessState::SignalsRestoredToDefault)?;
    lifecycle.advance(ProcessState::Draining)?;
    processor.drain()?;
    lifecycle.advance(ProcessState::Terminated)?;

    let mut out = processor.into_sink();
    writeln!(out, "{role} (pid={pid}) done")?;
    writeln!(out, "{}", SignalStats::collect(table))?;
    out.flush()?;
    Ok(code)
}
