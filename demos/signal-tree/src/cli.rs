use nix::sys::signal::Signal;
use std::str::FromStr;
use std::time::Duration;

/// Which of the exercise variants to run.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Children sum numbers while handling, blocking and masking signals.
    Summing,
    /// Children 2 and 3 send bursts of signals to the parent.
    Messaging,
    /// The parent blocks signals before fork; idle children report pending sets.
    Blocking,
}

#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(value_enum, env = "SIGNAL_TREE_SCENARIO", default_value = "summing")]
    pub scenario: ScenarioKind,

    /// Number of children to fork.
    #[clap(short, long, env = "SIGNAL_TREE_CHILDREN", default_value_t = 4)]
    pub children: usize,

    /// Signals to install a handler for, replacing the scenario's list.
    #[clap(long, env = "SIGNAL_TREE_HANDLE", value_delimiter = ',', value_parser = parse_signal)]
    pub handle: Vec<Signal>,

    /// Signals blocked for the whole run.
    #[clap(long, env = "SIGNAL_TREE_BLOCK", value_delimiter = ',', value_parser = parse_signal)]
    pub block: Vec<Signal>,

    /// Signals blocked while a handler runs.
    #[clap(long, env = "SIGNAL_TREE_MASK", value_delimiter = ',', value_parser = parse_signal)]
    pub mask: Vec<Signal>,

    #[clap(long, env = "SIGNAL_TREE_IGNORE", value_delimiter = ',', value_parser = parse_signal)]
    pub ignore: Vec<Signal>,

    /// Milliseconds between non-blocking waits in the parent.
    #[clap(
        long,
        env = "SIGNAL_TREE_POLL_MS",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Milliseconds per workload step in summing children.
    #[clap(long, env = "SIGNAL_TREE_STEP_MS", default_value_t = 1000)]
    pub step_ms: u64,

    /// Seconds the parent lingers with default dispositions restored.
    #[clap(long, env = "SIGNAL_TREE_TAIL_SECS", default_value_t = 10)]
    pub tail_secs: u64,

    /// Unblock always-blocked signals right before restoring defaults.
    #[clap(long, env = "SIGNAL_TREE_LIFT_BLOCKS")]
    pub lift_blocks: bool,

    /// Do not print the raw handler line for each delivery.
    #[clap(short, long, env = "SIGNAL_TREE_QUIET_HANDLER")]
    pub quiet_handler: bool,
}

impl Args {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn tail_window(&self) -> Duration {
        Duration::from_secs(self.tail_secs)
    }
}

/// Accepts `SIGINT`, `int`, `INT` or a plain number.
fn parse_signal(value: &str) -> Result<Signal, String> {
    let value = value.trim();
    if let Ok(number) = value.parse::<i32>() {
        return Signal::try_from(number).map_err(|e| format!("{value}: {e}"));
    }
    let upper = value.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| format!("unknown signal: {value}"))
}
