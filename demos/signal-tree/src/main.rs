mod cli;
mod scenario;

use clap::Parser;
use log::{error, info, warn};
use signal_ledger::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cli::Args::parse();
    let plan = scenario::build(&args);

    let config = CoordinatorConfig {
        poll_interval: args.poll_interval(),
        tail_window: args.tail_window(),
        lift_blocks_on_shutdown: args.lift_blocks,
        handler_output: if args.quiet_handler {
            HandlerOutput::Silent
        } else {
            HandlerOutput::stdout()
        },
        report_pending: plan.report_pending,
    };

    info!("Running {:?} scenario with {} children", args.scenario, plan.workloads.len());
    let mut coordinator = ProcessGroupCoordinator::new(plan.policy, config);
    match coordinator.run(plan.workloads) {
        Ok(report) => {
            for (child, exit) in &report.children {
                if !exit.success() {
                    warn!("{child} {exit}");
                }
            }
            info!("Parent exiting");
            if !report.all_succeeded() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("{e}");
            eprintln!("signal-tree: {e}");
            std::process::exit(1);
        }
    }
}
